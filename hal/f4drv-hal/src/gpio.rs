//! Digital pin traits

/// Logic level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::High
    }
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Digital output pin
pub trait OutputPin {
    /// Drive the pin to `level`
    fn set_level(&mut self, level: Level);

    /// Level currently latched in the output register
    fn output_level(&self) -> Level;

    /// Drive the pin high
    fn set_high(&mut self) {
        self.set_level(Level::High);
    }

    /// Drive the pin low
    fn set_low(&mut self) {
        self.set_level(Level::Low);
    }

    /// Invert the latched output level
    fn toggle(&mut self) {
        let next = !self.output_level();
        self.set_level(next);
    }
}

/// Digital input pin
///
/// The sampled level is whatever the input stage sees; configuring the pin
/// as an input first is the caller's job.
pub trait InputPin {
    /// Sample the pin
    fn level(&self) -> Level;

    /// Check if the pin reads high
    fn is_high(&self) -> bool {
        self.level() == Level::High
    }

    /// Check if the pin reads low
    fn is_low(&self) -> bool {
        self.level() == Level::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch(Level);

    impl OutputPin for Latch {
        fn set_level(&mut self, level: Level) {
            self.0 = level;
        }

        fn output_level(&self) -> Level {
            self.0
        }
    }

    #[test]
    fn test_toggle_inverts() {
        let mut pin = Latch(Level::Low);
        pin.toggle();
        assert_eq!(pin.output_level(), Level::High);
        pin.toggle();
        assert_eq!(pin.output_level(), Level::Low);
    }

    #[test]
    fn test_level_bool_conversion() {
        assert_eq!(Level::from(true), Level::High);
        assert!(!bool::from(Level::Low));
    }
}
