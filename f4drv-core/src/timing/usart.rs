//! USART baud-rate register (BRR)

/// Receiver oversampling (CR1.OVER8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// 16 samples per bit
    #[default]
    By16,
    /// 8 samples per bit
    By8,
}

/// Compute the BRR value for `baud` from the peripheral clock
///
/// USARTDIV is scaled by 100 to keep two fractional digits in integer
/// math. The fraction is rounded (`+50`) before being rescaled to 3 bits
/// (`By8`) or 4 bits (`By16`). With `By8` the mantissa is left in place
/// and bit 3 of BRR stays clear.
///
/// A zero baud rate yields 0, which leaves the divider unprogrammed.
pub fn brr(pclk_hz: u32, baud: u32, oversampling: Oversampling) -> u32 {
    if baud == 0 {
        return 0;
    }
    let pclk = pclk_hz as u64;
    let baud = baud as u64;
    let usartdiv = match oversampling {
        Oversampling::By8 => (25 * pclk) / (2 * baud),
        Oversampling::By16 => (25 * pclk) / (4 * baud),
    };

    let steps = match oversampling {
        Oversampling::By8 => 8,
        Oversampling::By16 => 16,
    };
    let mut mantissa = usartdiv / 100;
    let mut fraction = ((usartdiv - mantissa * 100) * steps + 50) / 100;
    // Rounding up to a whole step carries into the mantissa
    if fraction == steps {
        mantissa += 1;
        fraction = 0;
    }

    ((mantissa << 4) | (fraction & (steps - 1))) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_9600_from_16mhz() {
        // USARTDIV = 104.1875 -> 0x683
        assert_eq!(brr(16_000_000, 9600, Oversampling::By16), 0x683);
    }

    #[test]
    fn test_115200_from_16mhz() {
        // USARTDIV = 8.68 -> mantissa 8, fraction round(0.68 * 16) = 11
        assert_eq!(brr(16_000_000, 115_200, Oversampling::By16), 0x8B);
    }

    #[test]
    fn test_oversampling_by8() {
        // USARTDIV = 17.36 -> mantissa 17, fraction round(0.36 * 8) = 3
        assert_eq!(brr(16_000_000, 115_200, Oversampling::By8), (17 << 4) | 3);
    }

    #[test]
    fn test_fraction_carries_into_mantissa() {
        // USARTDIV = 2.98 scaled -> rounds to 3.0
        assert_eq!(brr(2_390_000, 50_000, Oversampling::By16), 3 << 4);
    }

    #[test]
    fn test_zero_baud() {
        assert_eq!(brr(16_000_000, 0, Oversampling::By16), 0);
    }

    proptest! {
        #[test]
        fn prop_brr_close_to_ideal(pclk in 8_000_000u32..=84_000_000, baud in 1200u32..=460_800) {
            let value = brr(pclk, baud, Oversampling::By16);
            // Effective divider in 1/16ths
            let effective = (value >> 4) * 16 + (value & 0xF);
            let ideal = pclk as f64 / baud as f64;
            prop_assert!((effective as f64 - ideal).abs() <= 1.5);
        }
    }
}
