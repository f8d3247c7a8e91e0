//! f4drv firmware
//!
//! Brings up an STM32F407 board on the f4drv driver stack: clock tree from
//! `board.toml`, pin muxing, NVIC priorities, and one interrupt-driven
//! transfer per engine. Presses of the user button are counted and reported
//! on the console.

#![no_std]
#![no_main]

use core::fmt::Write as _;

use cortex_m_rt::entry;
use defmt::{debug, info, unwrap, warn};
use heapless::String;
use portable_atomic::{AtomicU32, Ordering};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use f4drv_core::I2cEvent;
use f4drv_hal::RepeatedStart;
use f4drv_hal_stm32f407::exti::Exti;
use f4drv_hal_stm32f407::gpio::{Gpio, PinConfig};
use f4drv_hal_stm32f407::i2c::{I2c, I2cConfig, I2cSpeed};
use f4drv_hal_stm32f407::nvic::{Irq, Nvic, NvicConfig, PriorityGrouping};
use f4drv_hal_stm32f407::rcc::{ClockGate, Rcc};
use f4drv_hal_stm32f407::spi::{Spi, SpiConfig};
use f4drv_hal_stm32f407::usart::{BaudRate, Usart, UsartConfig, UsartInstance};
use f4drv_hal_stm32f407::{Callback, EventCallback, ExtiRegistry, Peripherals};

use crate::irq::{ExtiDispatch, CONSOLE, EXTI, FLASH_BUS, SENSOR_BUS};

mod board;
mod irq;

const BANNER: &[u8] = b"f4drv up\r\n";

/// JEDEC "read identification" command clocked out on SPI1
const READ_ID: [u8; 4] = [0x9F, 0x00, 0x00, 0x00];

// Static cells for transfer buffers (must live forever for the engines)
static SENSOR_RX: StaticCell<[u8; 2]> = StaticCell::new();
static FLASH_RX: StaticCell<[u8; 4]> = StaticCell::new();

static BUTTON_PRESSES: AtomicU32 = AtomicU32::new(0);

/// Main entry point
#[entry]
fn main() -> ! {
    info!("f4drv firmware starting...");

    let p = unwrap!(Peripherals::take());

    // ========================================================================
    // Clocks
    // ========================================================================
    let mut rcc = Rcc::new(p.rcc);
    let clocks = unwrap!(rcc.init(&board::CLOCK));
    info!("Clocks: {}", clocks);

    for gate in [
        ClockGate::GpioA,
        ClockGate::GpioB,
        ClockGate::Syscfg,
        ClockGate::Usart2,
        ClockGate::I2c1,
        ClockGate::Spi1,
    ] {
        rcc.enable(gate);
    }

    // ========================================================================
    // Pins
    // ========================================================================
    let mut gpioa = Gpio::new(p.gpioa);
    let mut gpiob = Gpio::new(p.gpiob);

    let console_pins = PinConfig::alternate(board::CONSOLE_AF);
    unwrap!(gpioa.configure(board::CONSOLE_TX, &console_pins));
    unwrap!(gpioa.configure(board::CONSOLE_RX, &console_pins));

    let i2c_pins = PinConfig::alternate_open_drain(board::I2C_AF);
    unwrap!(gpiob.configure(board::I2C_SCL, &i2c_pins));
    unwrap!(gpiob.configure(board::I2C_SDA, &i2c_pins));

    let spi_pins = PinConfig::alternate(board::SPI_AF);
    for pin in [board::SPI_SCK, board::SPI_MISO, board::SPI_MOSI] {
        unwrap!(gpioa.configure(pin, &spi_pins));
    }

    let mut exti = Exti::new(p.exti, p.syscfg);
    let mut registry = ExtiRegistry::new();
    unwrap!(gpioa.configure_interrupt(
        board::BUTTON,
        &board::BUTTON_CONFIG,
        &mut exti,
        &mut registry,
        Callback::Fn(on_button),
    ));

    // ========================================================================
    // Engines
    // ========================================================================
    let mut console = Usart::new(
        p.usart2,
        UsartConfig {
            baud_rate: BaudRate::Custom(board::CONSOLE_BAUD),
            ..UsartConfig::default()
        },
    );
    unwrap!(console.init(clocks.for_bus(UsartInstance::Usart2.bus())));
    unwrap!(console.send_it(BANNER, Callback::Fn(on_console_sent)));

    let mut sensor = I2c::new(
        p.i2c1,
        I2cConfig {
            scl_speed: I2cSpeed::Custom(board::I2C_SPEED_HZ),
            own_address: board::I2C_OWN_ADDRESS,
            ..I2cConfig::STANDARD
        },
    );
    unwrap!(sensor.init(clocks.pclk1_hz));
    sensor.set_callback(EventCallback::Fn(on_sensor_event));
    let sensor_rx = SENSOR_RX.init([0; 2]);
    unwrap!(sensor.master_read_it(
        board::I2C_SENSOR_ADDRESS,
        sensor_rx,
        RepeatedStart::Disabled
    ));

    let mut flash = Spi::new(
        p.spi1,
        SpiConfig {
            divider: board::SPI_DIVIDER,
            ssm: true,
            ..SpiConfig::default()
        },
    );
    flash.init();
    flash.set_error_callback(Callback::Fn(on_flash_overrun));
    let flash_rx = FLASH_RX.init([0; 4]);
    unwrap!(flash.receive_it(flash_rx, Callback::Fn(on_flash_id)));
    unwrap!(flash.send_it(&READ_ID, Callback::Noop));

    critical_section::with(|cs| {
        CONSOLE.borrow_ref_mut(cs).replace(console);
        SENSOR_BUS.borrow_ref_mut(cs).replace(sensor);
        FLASH_BUS.borrow_ref_mut(cs).replace(flash);
        EXTI.borrow_ref_mut(cs).replace(ExtiDispatch { exti, registry });
    });

    // ========================================================================
    // Interrupts
    // ========================================================================
    let mut nvic = Nvic::new(p.nvic, p.scb);
    nvic.set_grouping(PriorityGrouping::Group2Sub2);

    let vectors = [
        (Irq::I2C1_EV, 0, 0),
        (Irq::I2C1_ER, 0, 1),
        (Irq::SPI1, 1, 0),
        (Irq::USART2, 2, 0),
        (Irq::EXTI0, 3, 0),
    ];
    for (irq, group, sub) in vectors {
        let config = NvicConfig {
            group,
            sub,
            pending: false,
        };
        unwrap!(nvic.configure(irq, &config));
    }

    info!("Initialization complete");

    let mut reported = 0;
    loop {
        cortex_m::asm::wfi();

        let presses = BUTTON_PRESSES.load(Ordering::Relaxed);
        if presses != reported {
            reported = presses;
            report_press(presses);
        }
    }
}

/// Write the press count on the console with the polled path
///
/// The engine is taken out of its cell for the send so interrupts stay
/// unmasked while the line shifts out; USART2 finds the cell empty and
/// returns.
fn report_press(presses: u32) {
    let mut line: String<32> = String::new();
    if write!(line, "button #{}\r\n", presses).is_err() {
        return;
    }

    let console = critical_section::with(|cs| {
        let mut slot = CONSOLE.borrow_ref_mut(cs);
        // An interrupt-driven send still owns the transmitter
        if slot.as_ref().is_some_and(|c| !c.tx_state().is_ready()) {
            warn!("console busy, dropping press report");
            return None;
        }
        slot.take()
    });
    let Some(mut console) = console else {
        return;
    };

    if let Err(e) = console.send(line.as_bytes()) {
        warn!("console write failed: {}", e);
    }

    critical_section::with(|cs| {
        CONSOLE.borrow_ref_mut(cs).replace(console);
    });
}

// ============================================================================
// Callbacks (run in interrupt context, engines already borrowed)
// ============================================================================

fn on_button() {
    BUTTON_PRESSES.fetch_add(1, Ordering::Relaxed);
}

fn on_console_sent() {
    debug!("Console banner sent");
}

fn on_sensor_event(event: I2cEvent) {
    if event.is_error() {
        warn!("Sensor bus: {}", event);
    } else if event == I2cEvent::RxComplete {
        info!("Sensor read complete");
    }
}

fn on_flash_id() {
    info!("Flash ID received");
}

fn on_flash_overrun() {
    warn!("SPI1 overrun");
}
