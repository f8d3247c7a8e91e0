//! Shared engine cells and vector-table wiring
//!
//! Bring-up moves each engine into its cell before the NVIC line is
//! enabled; vectors borrow the cell inside a critical section and hand the
//! work to the engine.

use core::cell::RefCell;

use critical_section::Mutex;
use stm32f4::stm32f407::interrupt;

use f4drv_hal_stm32f407::exti::{Exti, ExtiGroup, ExtiRegistry};
use f4drv_hal_stm32f407::ral::Mmio;
use f4drv_hal_stm32f407::{I2c, Spi, Usart};

/// EXTI driver plus the per-line callbacks its vectors run
pub struct ExtiDispatch {
    pub exti: Exti<Mmio>,
    pub registry: ExtiRegistry<'static>,
}

pub static CONSOLE: Mutex<RefCell<Option<Usart<'static, Mmio>>>> = Mutex::new(RefCell::new(None));
pub static SENSOR_BUS: Mutex<RefCell<Option<I2c<'static, Mmio>>>> = Mutex::new(RefCell::new(None));
pub static FLASH_BUS: Mutex<RefCell<Option<Spi<'static, Mmio>>>> = Mutex::new(RefCell::new(None));
pub static EXTI: Mutex<RefCell<Option<ExtiDispatch>>> = Mutex::new(RefCell::new(None));

#[interrupt]
fn USART2() {
    critical_section::with(|cs| {
        if let Some(console) = CONSOLE.borrow_ref_mut(cs).as_mut() {
            console.handle_interrupt();
        }
    });
}

#[interrupt]
fn I2C1_EV() {
    critical_section::with(|cs| {
        if let Some(i2c) = SENSOR_BUS.borrow_ref_mut(cs).as_mut() {
            i2c.handle_event_interrupt();
        }
    });
}

#[interrupt]
fn I2C1_ER() {
    critical_section::with(|cs| {
        if let Some(i2c) = SENSOR_BUS.borrow_ref_mut(cs).as_mut() {
            i2c.handle_error_interrupt();
        }
    });
}

#[interrupt]
fn SPI1() {
    critical_section::with(|cs| {
        if let Some(spi) = FLASH_BUS.borrow_ref_mut(cs).as_mut() {
            spi.handle_interrupt();
        }
    });
}

#[interrupt]
fn EXTI0() {
    dispatch(ExtiGroup::Line0);
}

#[interrupt]
fn EXTI9_5() {
    dispatch(ExtiGroup::Lines9To5);
}

#[interrupt]
fn EXTI15_10() {
    dispatch(ExtiGroup::Lines15To10);
}

fn dispatch(group: ExtiGroup) {
    critical_section::with(|cs| {
        if let Some(ExtiDispatch { exti, registry }) = EXTI.borrow_ref_mut(cs).as_mut() {
            registry.dispatch(group, exti.regs());
        }
    });
}
