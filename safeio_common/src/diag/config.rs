//! Diagnostic timing and error-limit configuration (`[diag]` section).
//!
//! Intervals are given in milliseconds and converted to scheduler ticks by the
//! engine using `cycle_time_us` (rounded up, at least one tick).

use serde::{Deserialize, Serialize};

use crate::consts::{CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN};

/// TO-Test pulse width selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToTiming {
    /// 1 ms pulse.
    #[default]
    Short,
    /// 4 ms pulse.
    Medium,
    /// 10 ms pulse.
    Long,
}

impl ToTiming {
    /// Pulse width (delay between start and reset-pulse) in milliseconds.
    pub const fn pulse_ms(self) -> u32 {
        match self {
            Self::Short => 1,
            Self::Medium => 4,
            Self::Long => 10,
        }
    }
}

/// TO line operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToMode {
    /// Cyclic TO-Test on contact inputs.
    #[default]
    Test,
    /// TO line force-driven high every tick, no test.
    AlwaysOn,
    /// TO line force-driven low every tick, no test.
    AlwaysOff,
}

/// Hysteresis limits for confirmed faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLimits {
    /// Consecutive Level-Test failures before Error.
    #[serde(default = "default_limit")]
    pub level: u16,
    /// Consecutive short-check failures before Error.
    #[serde(default = "default_limit")]
    pub short: u16,
    /// Consecutive TO-Test failures before Error.
    #[serde(default = "default_limit")]
    pub to: u16,
    /// Consecutive HS-Test failures before Error.
    #[serde(default = "default_limit")]
    pub hs: u16,
    /// Consecutive VSUP-Test failures before Error.
    #[serde(default = "default_limit")]
    pub vsup: u16,
    /// Pin-state check counter value that confirms Error.
    #[serde(default = "default_pin_check_limit")]
    pub pin_check: u16,
    /// Pin-state check increment per mismatch.
    #[serde(default = "default_pin_check_up")]
    pub pin_check_step_up: u16,
    /// Pin-state check decrement per match.
    #[serde(default = "default_pin_check_down")]
    pub pin_check_step_down: u16,
}

fn default_limit() -> u16 {
    3
}
fn default_pin_check_limit() -> u16 {
    10
}
fn default_pin_check_up() -> u16 {
    2
}
fn default_pin_check_down() -> u16 {
    1
}

impl Default for ErrorLimits {
    fn default() -> Self {
        Self {
            level: default_limit(),
            short: default_limit(),
            to: default_limit(),
            hs: default_limit(),
            vsup: default_limit(),
            pin_check: default_pin_check_limit(),
            pin_check_step_up: default_pin_check_up(),
            pin_check_step_down: default_pin_check_down(),
        }
    }
}

impl ErrorLimits {
    /// Validate limit bounds.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("level", self.level),
            ("short", self.short),
            ("to", self.to),
            ("hs", self.hs),
            ("vsup", self.vsup),
            ("pin_check", self.pin_check),
            ("pin_check_step_up", self.pin_check_step_up),
            ("pin_check_step_down", self.pin_check_step_down),
        ] {
            if value == 0 {
                return Err(format!("limits.{name} must be >= 1"));
            }
        }
        if self.pin_check_step_up > self.pin_check {
            return Err(format!(
                "limits.pin_check_step_up {} exceeds limits.pin_check {}",
                self.pin_check_step_up, self.pin_check
            ));
        }
        Ok(())
    }
}

/// `[diag]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagConfig {
    /// Scheduler tick in microseconds (default: 1000).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Delay before the first Level-Test after an input turns active [ms].
    #[serde(default = "default_first_ms")]
    pub level_first_ms: u32,

    /// Cyclic Level-Test interval [ms].
    #[serde(default = "default_cyclic_ms")]
    pub level_cyclic_ms: u32,

    /// Cyclic TO-Test interval [ms].
    #[serde(default = "default_cyclic_ms")]
    pub to_cyclic_ms: u32,

    /// TO-Test pulse width selector.
    #[serde(default)]
    pub to_timing: ToTiming,

    /// TO line mode.
    #[serde(default)]
    pub to_mode: ToMode,

    /// Delay before the first HS-Test after an output turns on [ms].
    #[serde(default = "default_first_ms")]
    pub hs_first_ms: u32,

    /// Cyclic HS-Test interval [ms].
    #[serde(default = "default_cyclic_ms")]
    pub hs_cyclic_ms: u32,

    /// Cyclic VSUP-Test interval [ms].
    #[serde(default = "default_cyclic_ms")]
    pub vsup_cyclic_ms: u32,

    /// Watchdog check period [ms].
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u32,

    /// Longest time an output may stay on without a completed HS-Test [ms].
    #[serde(default = "default_hs_timeout_ms")]
    pub hs_timeout_ms: u32,

    /// Hysteresis limits.
    #[serde(default)]
    pub limits: ErrorLimits,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}
fn default_first_ms() -> u32 {
    1
}
fn default_cyclic_ms() -> u32 {
    1000
}
fn default_watchdog_ms() -> u32 {
    5000
}
fn default_hs_timeout_ms() -> u32 {
    10_000
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            level_first_ms: default_first_ms(),
            level_cyclic_ms: default_cyclic_ms(),
            to_cyclic_ms: default_cyclic_ms(),
            to_timing: ToTiming::default(),
            to_mode: ToMode::default(),
            hs_first_ms: default_first_ms(),
            hs_cyclic_ms: default_cyclic_ms(),
            vsup_cyclic_ms: default_cyclic_ms(),
            watchdog_ms: default_watchdog_ms(),
            hs_timeout_ms: default_hs_timeout_ms(),
            limits: ErrorLimits::default(),
        }
    }
}

impl DiagConfig {
    /// Validate parameter bounds. Cross-field checks that need the pin
    /// layout (watchdog worst case) are done by the engine loader.
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            ));
        }
        for (name, value) in [
            ("level_cyclic_ms", self.level_cyclic_ms),
            ("to_cyclic_ms", self.to_cyclic_ms),
            ("hs_cyclic_ms", self.hs_cyclic_ms),
            ("vsup_cyclic_ms", self.vsup_cyclic_ms),
            ("watchdog_ms", self.watchdog_ms),
            ("hs_timeout_ms", self.hs_timeout_ms),
        ] {
            if value == 0 {
                return Err(format!("{name} must be > 0"));
            }
        }
        if self.hs_timeout_ms <= self.hs_cyclic_ms {
            return Err(format!(
                "hs_timeout_ms {} must exceed hs_cyclic_ms {}",
                self.hs_timeout_ms, self.hs_cyclic_ms
            ));
        }
        self.limits.validate()
    }
}
