//! Clock-tree arithmetic
//!
//! Maps the encoded RCC prescaler fields to divisors and derives the bus
//! clock frequencies that timing-sensitive peripherals (I2C, USART) are
//! programmed from. Nothing here touches hardware; the RCC driver reads the
//! fields and feeds them in.
//!
//! The PLL path is not modelled: any derivation that lands on the PLL
//! reports [`Error::Unsupported`].

use crate::error::{Error, Result};

/// Internal RC oscillator frequency
pub const HSI_HZ: u32 = 16_000_000;

/// External oscillator frequency assumed for the board
pub const HSE_HZ: u32 = 8_000_000;

/// Divisors for AHB prescaler encodings 8..=15
const AHB_DIVISORS: [u32; 8] = [2, 4, 8, 16, 64, 128, 256, 512];

/// Divisors for APB prescaler encodings 4..=7
const APB_DIVISORS: [u32; 4] = [2, 4, 8, 16];

/// System clock source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClockSource {
    /// Internal 16 MHz RC oscillator
    #[default]
    Hsi,
    /// External crystal (HSE, bypass off)
    HseCrystal,
    /// External RC / clock signal (HSE with bypass)
    HseBypass,
    /// Phase-locked loop (not supported by this driver)
    Pll,
}

impl SysClockSource {
    /// Nominal frequency of the source in Hz
    pub fn nominal_hz(&self) -> Result<u32> {
        match self {
            SysClockSource::Hsi => Ok(HSI_HZ),
            SysClockSource::HseCrystal | SysClockSource::HseBypass => Ok(HSE_HZ),
            SysClockSource::Pll => Err(Error::Unsupported),
        }
    }

    /// Decode the 2-bit switch status field (SWS)
    ///
    /// SWS cannot tell a crystal from a bypassed clock, so the caller passes
    /// the HSE bypass bit.
    pub fn from_switch_status(sws: u32, hse_bypass: bool) -> Result<Self> {
        match sws & 0x3 {
            0 => Ok(SysClockSource::Hsi),
            1 if hse_bypass => Ok(SysClockSource::HseBypass),
            1 => Ok(SysClockSource::HseCrystal),
            2 => Ok(SysClockSource::Pll),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Value of the 2-bit switch field (SW) selecting this source
    pub const fn switch_bits(&self) -> u32 {
        match self {
            SysClockSource::Hsi => 0,
            SysClockSource::HseCrystal | SysClockSource::HseBypass => 1,
            SysClockSource::Pll => 2,
        }
    }
}

/// AHB prescaler (HPRE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    const TABLE: [AhbPrescaler; 8] = [
        AhbPrescaler::Div2,
        AhbPrescaler::Div4,
        AhbPrescaler::Div8,
        AhbPrescaler::Div16,
        AhbPrescaler::Div64,
        AhbPrescaler::Div128,
        AhbPrescaler::Div256,
        AhbPrescaler::Div512,
    ];

    /// 4-bit HPRE encoding
    pub const fn bits(&self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 0,
            AhbPrescaler::Div2 => 8,
            AhbPrescaler::Div4 => 9,
            AhbPrescaler::Div8 => 10,
            AhbPrescaler::Div16 => 11,
            AhbPrescaler::Div64 => 12,
            AhbPrescaler::Div128 => 13,
            AhbPrescaler::Div256 => 14,
            AhbPrescaler::Div512 => 15,
        }
    }

    /// Decode an HPRE field; encodings below 8 mean "not divided"
    pub fn from_bits(bits: u32) -> Self {
        let bits = bits & 0xF;
        if bits < 8 {
            AhbPrescaler::Div1
        } else {
            Self::TABLE[(bits - 8) as usize]
        }
    }

    /// Division factor
    pub fn divisor(&self) -> u32 {
        match self.bits() {
            0 => 1,
            b => AHB_DIVISORS[(b - 8) as usize],
        }
    }
}

/// APB1/APB2 prescaler (PPRE1/PPRE2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    /// 3-bit PPRE encoding
    pub const fn bits(&self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 0,
            ApbPrescaler::Div2 => 4,
            ApbPrescaler::Div4 => 5,
            ApbPrescaler::Div8 => 6,
            ApbPrescaler::Div16 => 7,
        }
    }

    /// Decode a PPRE field; encodings below 4 mean "not divided"
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            4 => ApbPrescaler::Div2,
            5 => ApbPrescaler::Div4,
            6 => ApbPrescaler::Div8,
            7 => ApbPrescaler::Div16,
            _ => ApbPrescaler::Div1,
        }
    }

    /// Division factor
    pub fn divisor(&self) -> u32 {
        match self.bits() {
            0 => 1,
            b => APB_DIVISORS[(b - 4) as usize],
        }
    }
}

/// Peripheral bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Ahb1,
    Ahb2,
    Apb1,
    Apb2,
}

/// System clock configuration
///
/// Prescalers are programmed before the source switch so the buses never
/// transiently run above their limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// System clock source
    pub source: SysClockSource,
    /// AHB prescaler
    pub ahb: AhbPrescaler,
    /// APB1 (low-speed) prescaler
    pub apb1: ApbPrescaler,
    /// APB2 (high-speed) prescaler
    pub apb2: ApbPrescaler,
}

/// Derived bus clock frequencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusClocks {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
}

impl BusClocks {
    /// Derive the bus clocks from a source and its prescalers
    pub fn derive(
        source: SysClockSource,
        ahb: AhbPrescaler,
        apb1: ApbPrescaler,
        apb2: ApbPrescaler,
    ) -> Result<Self> {
        let sysclk_hz = source.nominal_hz()?;
        let hclk_hz = sysclk_hz / ahb.divisor();
        Ok(Self {
            sysclk_hz,
            hclk_hz,
            pclk1_hz: hclk_hz / apb1.divisor(),
            pclk2_hz: hclk_hz / apb2.divisor(),
        })
    }

    /// Derive the bus clocks a [`ClockConfig`] will produce
    pub fn from_config(config: &ClockConfig) -> Result<Self> {
        Self::derive(config.source, config.ahb, config.apb1, config.apb2)
    }

    /// Clock feeding peripherals on the given bus
    pub fn for_bus(&self, bus: Bus) -> u32 {
        match bus {
            Bus::Ahb1 | Bus::Ahb2 => self.hclk_hz,
            Bus::Apb1 => self.pclk1_hz,
            Bus::Apb2 => self.pclk2_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const AHB_ALL: [AhbPrescaler; 9] = [
        AhbPrescaler::Div1,
        AhbPrescaler::Div2,
        AhbPrescaler::Div4,
        AhbPrescaler::Div8,
        AhbPrescaler::Div16,
        AhbPrescaler::Div64,
        AhbPrescaler::Div128,
        AhbPrescaler::Div256,
        AhbPrescaler::Div512,
    ];

    const APB_ALL: [ApbPrescaler; 5] = [
        ApbPrescaler::Div1,
        ApbPrescaler::Div2,
        ApbPrescaler::Div4,
        ApbPrescaler::Div8,
        ApbPrescaler::Div16,
    ];

    #[test]
    fn test_low_encodings_are_undivided() {
        for bits in 0..8 {
            assert_eq!(AhbPrescaler::from_bits(bits).divisor(), 1);
        }
        for bits in 0..4 {
            assert_eq!(ApbPrescaler::from_bits(bits).divisor(), 1);
        }
    }

    #[test]
    fn test_ahb_table() {
        let expected = [2, 4, 8, 16, 64, 128, 256, 512];
        for (i, div) in expected.iter().enumerate() {
            assert_eq!(AhbPrescaler::from_bits(8 + i as u32).divisor(), *div);
        }
    }

    #[test]
    fn test_hsi_defaults() {
        let clocks = BusClocks::from_config(&ClockConfig::default()).unwrap();
        assert_eq!(clocks.sysclk_hz, 16_000_000);
        assert_eq!(clocks.pclk1_hz, 16_000_000);
        assert_eq!(clocks.pclk2_hz, 16_000_000);
    }

    #[test]
    fn test_hse_with_dividers() {
        let clocks = BusClocks::derive(
            SysClockSource::HseCrystal,
            AhbPrescaler::Div2,
            ApbPrescaler::Div2,
            ApbPrescaler::Div1,
        )
        .unwrap();
        assert_eq!(clocks.hclk_hz, 4_000_000);
        assert_eq!(clocks.pclk1_hz, 2_000_000);
        assert_eq!(clocks.pclk2_hz, 4_000_000);
        assert_eq!(clocks.for_bus(Bus::Apb1), 2_000_000);
        assert_eq!(clocks.for_bus(Bus::Ahb1), 4_000_000);
    }

    #[test]
    fn test_pll_is_unsupported() {
        let config = ClockConfig {
            source: SysClockSource::Pll,
            ..Default::default()
        };
        assert_eq!(BusClocks::from_config(&config), Err(Error::Unsupported));
    }

    #[test]
    fn test_switch_status_decode() {
        assert_eq!(
            SysClockSource::from_switch_status(0, false),
            Ok(SysClockSource::Hsi)
        );
        assert_eq!(
            SysClockSource::from_switch_status(1, false),
            Ok(SysClockSource::HseCrystal)
        );
        assert_eq!(
            SysClockSource::from_switch_status(1, true),
            Ok(SysClockSource::HseBypass)
        );
        assert_eq!(
            SysClockSource::from_switch_status(2, false),
            Ok(SysClockSource::Pll)
        );
        assert_eq!(
            SysClockSource::from_switch_status(3, false),
            Err(Error::InvalidArgument)
        );
    }

    proptest! {
        #[test]
        fn prop_apb_is_source_over_ahb_over_apb(
            src in 0usize..3,
            ahb in 0usize..9,
            apb1 in 0usize..5,
            apb2 in 0usize..5,
        ) {
            let source = [
                SysClockSource::Hsi,
                SysClockSource::HseCrystal,
                SysClockSource::HseBypass,
            ][src];
            let (ahb, apb1, apb2) = (AHB_ALL[ahb], APB_ALL[apb1], APB_ALL[apb2]);
            let clocks = BusClocks::derive(source, ahb, apb1, apb2).unwrap();
            let nominal = source.nominal_hz().unwrap();

            prop_assert_eq!(clocks.pclk1_hz, nominal / ahb.divisor() / apb1.divisor());
            prop_assert_eq!(clocks.pclk2_hz, nominal / ahb.divisor() / apb2.divisor());
            prop_assert_eq!(AhbPrescaler::from_bits(ahb.bits()), ahb);
            prop_assert_eq!(ApbPrescaler::from_bits(apb1.bits()), apb1);
        }
    }
}
