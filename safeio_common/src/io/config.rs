//! Per-pin configuration (`[[inputs]]` / `[[outputs]]` tables).
//!
//! The TOML form is field-per-property; the engine works on the packed
//! [`PinFlags`] word plus the numeric fields.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::pin::PinId;
use crate::consts::HS_OFFSET_MAX;

bitflags! {
    /// Packed boolean pin properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PinFlags: u8 {
        /// Pin takes part in diagnostics and state handling.
        const ENABLED      = 0x01;
        /// Pin is one member of a dual-channel pair.
        const DUAL_CHANNEL = 0x02;
        /// Input is a potential-free contact powered from the TO line.
        const CONTACT      = 0x04;
        /// Input leaves Error by itself once it reads inactive.
        const AUTO_RESET   = 0x08;
        /// Output participates in SafeBound handling.
        const SAFE_BOUND   = 0x10;
    }
}

impl Default for PinFlags {
    fn default() -> Self {
        Self::ENABLED
    }
}

/// Input sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Potential-free contact fed by the channel's TO line.
    Contact,
    /// Electronic sensor (OSSD), no TO wiring.
    #[default]
    Semiconductor,
}

fn default_true() -> bool {
    true
}

/// One `[[inputs]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Global DI index.
    pub pin: PinId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dual_channel: bool,
    #[serde(default)]
    pub kind: InputKind,
    #[serde(default)]
    pub auto_reset: bool,
    /// First-stage filter depth in samples, applied by the I/O layer.
    #[serde(default)]
    pub debounce: u8,
    /// Tolerated channel disagreement for dual-channel pairs [ms]. 0 disables.
    #[serde(default)]
    pub consistency_filter_ms: u32,
}

impl InputConfig {
    /// Packed property word.
    pub fn flags(&self) -> PinFlags {
        let mut flags = PinFlags::empty();
        flags.set(PinFlags::ENABLED, self.enabled);
        flags.set(PinFlags::DUAL_CHANNEL, self.dual_channel);
        flags.set(PinFlags::CONTACT, self.kind == InputKind::Contact);
        flags.set(PinFlags::AUTO_RESET, self.auto_reset);
        flags
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.consistency_filter_ms > 0 && !self.dual_channel {
            return Err(format!(
                "input {}: consistency_filter_ms requires dual_channel",
                self.pin
            ));
        }
        Ok(())
    }
}

/// One `[[outputs]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Global DO index.
    pub pin: PinId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dual_channel: bool,
    /// HS-Test readback offset in ticks after the discharge step (1..=HS_OFFSET_MAX).
    #[serde(default = "default_test_offset")]
    pub test_offset: u8,
    /// SS1-t delay on a normal off request [ms].
    #[serde(default)]
    pub ss1_delay_ms: u32,
    /// SafeBound participation. Carried for the protocol layer.
    #[serde(default)]
    pub safe_bound: bool,
}

fn default_test_offset() -> u8 {
    1
}

impl OutputConfig {
    pub fn flags(&self) -> PinFlags {
        let mut flags = PinFlags::empty();
        flags.set(PinFlags::ENABLED, self.enabled);
        flags.set(PinFlags::DUAL_CHANNEL, self.dual_channel);
        flags.set(PinFlags::SAFE_BOUND, self.safe_bound);
        flags
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.test_offset == 0 || self.test_offset > HS_OFFSET_MAX {
            return Err(format!(
                "output {}: test_offset {} out of range [1, {}]",
                self.pin, self.test_offset, HS_OFFSET_MAX
            ));
        }
        Ok(())
    }
}
