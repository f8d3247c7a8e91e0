//! Callback slots
//!
//! Every place a driver calls back into the application holds one of these
//! instead of an optional function pointer. An empty slot is the `Noop`
//! variant, so invoking a slot is always safe.
//!
//! Closures are held by mutable borrow: the borrow checker keeps the closure
//! alive for as long as the slot (and the engine or registry owning it).

/// Argument-less callback slot
#[derive(Default)]
pub enum Callback<'a> {
    /// Unregistered slot
    #[default]
    Noop,
    /// Plain function
    Fn(fn()),
    /// Borrowed closure
    Closure(&'a mut (dyn FnMut() + Send)),
}

impl<'a> Callback<'a> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Callback::Noop
    }

    /// Invoke the callback (no-op when unregistered)
    pub fn call(&mut self) {
        match self {
            Callback::Noop => {}
            Callback::Fn(f) => f(),
            Callback::Closure(c) => c(),
        }
    }

    /// Check if anything is registered
    pub fn is_registered(&self) -> bool {
        !matches!(self, Callback::Noop)
    }

    /// Take the callback out, leaving `Noop` behind
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

impl From<fn()> for Callback<'_> {
    fn from(f: fn()) -> Self {
        Callback::Fn(f)
    }
}

impl<'a> From<&'a mut (dyn FnMut() + Send)> for Callback<'a> {
    fn from(c: &'a mut (dyn FnMut() + Send)) -> Self {
        Callback::Closure(c)
    }
}

impl core::fmt::Debug for Callback<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Callback::Noop => write!(f, "Noop"),
            Callback::Fn(_) => write!(f, "Fn"),
            Callback::Closure(_) => write!(f, "Closure"),
        }
    }
}

/// Callback slot taking one event argument
pub enum EventCallback<'a, E> {
    /// Unregistered slot
    Noop,
    /// Plain function
    Fn(fn(E)),
    /// Borrowed closure
    Closure(&'a mut (dyn FnMut(E) + Send)),
}

impl<'a, E> EventCallback<'a, E> {
    /// Create an empty slot
    pub const fn new() -> Self {
        EventCallback::Noop
    }

    /// Invoke the callback with `event` (no-op when unregistered)
    pub fn call(&mut self, event: E) {
        match self {
            EventCallback::Noop => {}
            EventCallback::Fn(f) => f(event),
            EventCallback::Closure(c) => c(event),
        }
    }

    /// Check if anything is registered
    pub fn is_registered(&self) -> bool {
        !matches!(self, EventCallback::Noop)
    }
}

impl<E> Default for EventCallback<'_, E> {
    fn default() -> Self {
        EventCallback::Noop
    }
}

impl<E> From<fn(E)> for EventCallback<'_, E> {
    fn from(f: fn(E)) -> Self {
        EventCallback::Fn(f)
    }
}

impl<E> core::fmt::Debug for EventCallback<'_, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EventCallback::Noop => write!(f, "Noop"),
            EventCallback::Fn(_) => write!(f, "Fn"),
            EventCallback::Closure(_) => write!(f, "Closure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static HITS: AtomicU32 = AtomicU32::new(0);

    fn bump() {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_noop_is_safe() {
        let mut cb = Callback::new();
        cb.call();
        assert!(!cb.is_registered());
    }

    #[test]
    fn test_fn_callback() {
        let before = HITS.load(Ordering::SeqCst);
        let mut cb = Callback::from(bump as fn());
        cb.call();
        cb.call();
        assert_eq!(HITS.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn test_closure_callback() {
        let mut count = 0u32;
        {
            let mut inc = || count += 1;
            let mut cb = Callback::Closure(&mut inc);
            cb.call();
            cb.call();
            cb.call();
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_take_leaves_noop() {
        let mut cb = Callback::from(bump as fn());
        let taken = cb.take();
        assert!(taken.is_registered());
        assert!(!cb.is_registered());
    }

    #[test]
    fn test_event_callback_receives_event() {
        let mut seen = heapless::Vec::<u8, 4>::new();
        {
            let mut record = |e: u8| {
                let _ = seen.push(e);
            };
            let mut cb = EventCallback::Closure(&mut record);
            cb.call(7);
            cb.call(9);
        }
        assert_eq!(seen.as_slice(), &[7, 9]);
    }
}
