//! I2C clock control (CR2.FREQ, CCR, TRISE)

/// Highest SCL frequency handled as standard mode
pub const STANDARD_MODE_MAX_HZ: u32 = 100_000;

/// CCR.FS
pub const CCR_FS: u32 = 1 << 15;
/// CCR.DUTY
pub const CCR_DUTY: u32 = 1 << 14;

const CCR_MASK: u32 = 0xFFF;
const FREQ_MASK: u32 = 0x3F;
const TRISE_MASK: u32 = 0x3F;

/// Fast-mode SCL duty cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FmDuty {
    /// Tlow/Thigh = 2
    #[default]
    Ratio2,
    /// Tlow/Thigh = 16/9
    Ratio16To9,
}

/// Check if `scl_hz` needs fast-mode timing
pub fn is_fast_mode(scl_hz: u32) -> bool {
    scl_hz > STANDARD_MODE_MAX_HZ
}

/// CR2.FREQ: peripheral clock in whole MHz
pub fn freq_field(apb1_hz: u32) -> u32 {
    (apb1_hz / 1_000_000) & FREQ_MASK
}

/// Complete CCR register value
///
/// Standard mode divides by 2 (Thigh = Tlow). Fast mode sets FS and
/// divides by 3 or 25 according to the duty cycle.
pub fn ccr(apb1_hz: u32, scl_hz: u32, duty: FmDuty) -> u32 {
    if scl_hz == 0 {
        return 0;
    }
    if !is_fast_mode(scl_hz) {
        return (apb1_hz / (2 * scl_hz)) & CCR_MASK;
    }
    match duty {
        FmDuty::Ratio2 => CCR_FS | ((apb1_hz / (3 * scl_hz)) & CCR_MASK),
        FmDuty::Ratio16To9 => CCR_FS | CCR_DUTY | ((apb1_hz / (25 * scl_hz)) & CCR_MASK),
    }
}

/// TRISE: maximum rise time in peripheral clock cycles, plus one
///
/// Standard mode allows 1000 ns, fast mode 300 ns.
pub fn trise(apb1_hz: u32, scl_hz: u32) -> u32 {
    let cycles = if is_fast_mode(scl_hz) {
        (apb1_hz as u64 * 300 / 1_000_000_000) as u32
    } else {
        apb1_hz / 1_000_000
    };
    (cycles + 1) & TRISE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_mode_16mhz() {
        assert_eq!(freq_field(16_000_000), 16);
        assert_eq!(ccr(16_000_000, 100_000, FmDuty::Ratio2), 80);
        assert_eq!(trise(16_000_000, 100_000), 17);
    }

    #[test]
    fn test_fast_mode_duty_2() {
        let value = ccr(16_000_000, 400_000, FmDuty::Ratio2);
        assert_eq!(value & CCR_FS, CCR_FS);
        assert_eq!(value & CCR_DUTY, 0);
        assert_eq!(value & 0xFFF, 13);
    }

    #[test]
    fn test_fast_mode_duty_16_9() {
        let value = ccr(42_000_000, 400_000, FmDuty::Ratio16To9);
        assert_eq!(value & (CCR_FS | CCR_DUTY), CCR_FS | CCR_DUTY);
        assert_eq!(value & 0xFFF, 4);
    }

    #[test]
    fn test_fast_mode_trise() {
        // 42 MHz * 300 ns = 12.6 cycles
        assert_eq!(trise(42_000_000, 400_000), 13);
        assert_eq!(trise(16_000_000, 400_000), 5);
    }

    #[test]
    fn test_duty_ignored_in_standard_mode() {
        assert_eq!(
            ccr(8_000_000, 100_000, FmDuty::Ratio2),
            ccr(8_000_000, 100_000, FmDuty::Ratio16To9)
        );
    }

    proptest! {
        #[test]
        fn prop_fields_stay_in_range(apb1 in 2_000_000u32..=50_000_000, scl in 10_000u32..=400_000) {
            prop_assert!(freq_field(apb1) <= 0x3F);
            prop_assert!(trise(apb1, scl) <= 0x3F);
            prop_assert_eq!(ccr(apb1, scl, FmDuty::Ratio2) & !(CCR_FS | 0xFFF), 0);
            prop_assert_eq!(ccr(apb1, scl, FmDuty::Ratio2) & CCR_FS != 0, scl > 100_000);
        }
    }
}
