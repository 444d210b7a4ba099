//! System-wide constants for the safety I/O workspace.
//!
//! Single source of truth for pin bounds and timing defaults.

use static_assertions::const_assert;

/// Maximum number of digital safety inputs per device.
pub const MAX_DI: usize = 16;

/// Maximum number of digital safety outputs per device.
pub const MAX_DO: usize = 8;

/// Maximum number of dual-channel input pairs.
pub const MAX_DI_PAIRS: usize = MAX_DI / 2;

/// Number of controller channels (A and B).
pub const CHANNEL_COUNT: usize = 2;

/// Default scheduler tick in microseconds (1 kHz).
pub const CYCLE_TIME_US: u32 = 1000;

/// Cycle time bounds accepted by configuration validation.
pub const CYCLE_TIME_US_MIN: u32 = 100;
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Largest HS-Test readback offset (ticks after the discharge step).
pub const HS_OFFSET_MAX: u8 = 8;

/// Ticks the output stays off after an HS-Test before re-energising.
pub const HS_SETTLE_TICKS: u8 = 1;

/// Ticks between TO line re-assertion and the end of a TO-Test.
pub const TO_RECOVERY_TICKS: u16 = 2;

/// Minimum settle time after the VSUP life-signal toggle.
pub const VSUP_LIFE_SETTLE_TICKS: u16 = 2;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/safeio.toml";

// Packed per-pin bit masks in the exchange image.
const_assert!(MAX_DI <= 32);
const_assert!(MAX_DO <= 32);
const_assert!(MAX_DI % 2 == 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_DI > 0 && MAX_DO > 0);
        assert_eq!(MAX_DI_PAIRS * 2, MAX_DI);
        assert!(CYCLE_TIME_US >= CYCLE_TIME_US_MIN && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);
        assert!(HS_OFFSET_MAX >= 1);
    }
}
