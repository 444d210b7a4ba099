//! TOML configuration loader with validation.
//!
//! Loads a [`DeviceConfig`] and compiles it into the tick-based
//! [`DeviceSettings`] the engine runs on. Validates: parameter bounds,
//! contiguous pin ids, dual-channel pairing, and that the watchdog period
//! covers the worst-case test latency of the configured pin set.

use std::path::Path;

use heapless::Vec as HVec;
use safeio_common::config::{ConfigError, ConfigLoader, DeviceConfig};
use safeio_common::consts::{
    HS_OFFSET_MAX, MAX_DI, MAX_DO, TO_RECOVERY_TICKS, VSUP_LIFE_SETTLE_TICKS,
};
use safeio_common::diag::config::{ErrorLimits, ToMode};
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::{PinId, PinTopology, Role};

// ─── Compiled Settings ──────────────────────────────────────────────

/// Diagnostic intervals in scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagTiming {
    pub cycle_time_us: u32,
    pub level_first: u32,
    pub level_cyclic: u32,
    pub to_cyclic: u32,
    /// Ticks between TO line release and re-assertion.
    pub to_pulse: u32,
    pub to_mode: ToMode,
    pub hs_first: u32,
    pub hs_cyclic: u32,
    pub vsup_cyclic: u32,
    pub watchdog: u32,
    pub hs_timeout: u32,
}

impl Default for DiagTiming {
    fn default() -> Self {
        Self {
            cycle_time_us: 1000,
            level_first: 1,
            level_cyclic: 1000,
            to_cyclic: 1000,
            to_pulse: 1,
            to_mode: ToMode::Test,
            hs_first: 1,
            hs_cyclic: 1000,
            vsup_cyclic: 1000,
            watchdog: 5000,
            hs_timeout: 10_000,
        }
    }
}

/// Per-DI settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSettings {
    pub flags: PinFlags,
    pub debounce: u8,
    /// Consistency filter in ticks, 0 when disabled.
    pub consistency_ticks: u32,
}

impl InputSettings {
    #[inline]
    pub fn enabled(&self) -> bool {
        self.flags.contains(PinFlags::ENABLED)
    }

    #[inline]
    pub fn dual(&self) -> bool {
        self.flags.contains(PinFlags::DUAL_CHANNEL)
    }

    #[inline]
    pub fn contact(&self) -> bool {
        self.flags.contains(PinFlags::CONTACT)
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            flags: PinFlags::ENABLED,
            debounce: 0,
            consistency_ticks: 0,
        }
    }
}

/// Per-DO settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub flags: PinFlags,
    /// HS-Test readback offset after the discharge step.
    pub hs_offset: u8,
    /// SS1-t delay in ticks.
    pub ss1_ticks: u32,
}

impl OutputSettings {
    #[inline]
    pub fn enabled(&self) -> bool {
        self.flags.contains(PinFlags::ENABLED)
    }

    #[inline]
    pub fn dual(&self) -> bool {
        self.flags.contains(PinFlags::DUAL_CHANNEL)
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            flags: PinFlags::ENABLED,
            hs_offset: 1,
            ss1_ticks: 0,
        }
    }
}

/// Everything the engine needs, in ticks and packed flags.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub topology: PinTopology,
    pub timing: DiagTiming,
    pub limits: ErrorLimits,
    pub inputs: HVec<InputSettings, MAX_DI>,
    pub outputs: HVec<OutputSettings, MAX_DO>,
}

impl DeviceSettings {
    /// Settings for `di_count` single-channel semiconductor inputs and
    /// `do_count` outputs with default timing.
    pub fn uniform(di_count: u8, do_count: u8) -> Self {
        let topology = PinTopology::new(di_count, do_count);
        let mut inputs = HVec::new();
        for _ in 0..topology.di_count() {
            let pushed = inputs.push(InputSettings::default());
            debug_assert!(pushed.is_ok());
        }
        let mut outputs = HVec::new();
        for _ in 0..topology.do_count() {
            let pushed = outputs.push(OutputSettings::default());
            debug_assert!(pushed.is_ok());
        }
        Self {
            topology,
            timing: DiagTiming::default(),
            limits: ErrorLimits::default(),
            inputs,
            outputs,
        }
    }

    /// Compile a parsed configuration.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, ConfigError> {
        config.shared.validate()?;
        config
            .diag
            .validate()
            .map_err(ConfigError::ValidationError)?;

        if config.inputs.len() > MAX_DI {
            return Err(ConfigError::ValidationError(format!(
                "{} inputs configured, at most {MAX_DI} supported",
                config.inputs.len()
            )));
        }
        if config.outputs.len() > MAX_DO {
            return Err(ConfigError::ValidationError(format!(
                "{} outputs configured, at most {MAX_DO} supported",
                config.outputs.len()
            )));
        }

        let cycle = config.diag.cycle_time_us;
        let diag = &config.diag;
        let timing = DiagTiming {
            cycle_time_us: cycle,
            level_first: ms_to_ticks(diag.level_first_ms, cycle),
            level_cyclic: ms_to_ticks(diag.level_cyclic_ms, cycle),
            to_cyclic: ms_to_ticks(diag.to_cyclic_ms, cycle),
            to_pulse: ms_to_ticks(diag.to_timing.pulse_ms(), cycle),
            to_mode: diag.to_mode,
            hs_first: ms_to_ticks(diag.hs_first_ms, cycle),
            hs_cyclic: ms_to_ticks(diag.hs_cyclic_ms, cycle),
            vsup_cyclic: ms_to_ticks(diag.vsup_cyclic_ms, cycle),
            watchdog: ms_to_ticks(diag.watchdog_ms, cycle),
            hs_timeout: ms_to_ticks(diag.hs_timeout_ms, cycle),
        };

        let mut inputs: HVec<InputSettings, MAX_DI> = HVec::new();
        for (idx, input) in config.inputs.iter().enumerate() {
            if input.pin as usize != idx {
                return Err(ConfigError::ValidationError(format!(
                    "input ids must be contiguous from 0: entry {idx} has pin {}",
                    input.pin
                )));
            }
            input.validate().map_err(ConfigError::ValidationError)?;
            let settings = InputSettings {
                flags: input.flags(),
                debounce: input.debounce,
                consistency_ticks: if input.consistency_filter_ms == 0 {
                    0
                } else {
                    ms_to_ticks(input.consistency_filter_ms, cycle)
                },
            };
            if inputs.push(settings).is_err() {
                return Err(ConfigError::ValidationError("too many inputs".to_string()));
            }
        }

        let mut outputs: HVec<OutputSettings, MAX_DO> = HVec::new();
        for (idx, output) in config.outputs.iter().enumerate() {
            if output.pin as usize != idx {
                return Err(ConfigError::ValidationError(format!(
                    "output ids must be contiguous from 0: entry {idx} has pin {}",
                    output.pin
                )));
            }
            output.validate().map_err(ConfigError::ValidationError)?;
            let settings = OutputSettings {
                flags: output.flags(),
                hs_offset: output.test_offset,
                ss1_ticks: if output.ss1_delay_ms == 0 {
                    0
                } else {
                    ms_to_ticks(output.ss1_delay_ms, cycle)
                },
            };
            if outputs.push(settings).is_err() {
                return Err(ConfigError::ValidationError("too many outputs".to_string()));
            }
        }

        let settings = Self {
            topology: PinTopology::new(inputs.len() as u8, outputs.len() as u8),
            timing,
            limits: diag.limits,
            inputs,
            outputs,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-pin validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pairs(self)?;

        for (idx, output) in self.outputs.iter().enumerate() {
            if output.hs_offset == 0 || output.hs_offset > HS_OFFSET_MAX {
                return Err(ConfigError::ValidationError(format!(
                    "output {idx}: hs_offset {} out of range [1, {HS_OFFSET_MAX}]",
                    output.hs_offset
                )));
            }
        }

        let worst = self.worst_case_latency();
        if self.timing.watchdog < worst {
            return Err(ConfigError::ValidationError(format!(
                "watchdog period {} ticks shorter than worst-case test latency {} ticks",
                self.timing.watchdog, worst
            )));
        }
        if self.timing.hs_timeout < worst {
            return Err(ConfigError::ValidationError(format!(
                "hs_timeout {} ticks shorter than worst-case test latency {} ticks",
                self.timing.hs_timeout, worst
            )));
        }
        Ok(())
    }

    /// Longest time a continuously eligible test can wait for its turn:
    /// its own cyclic interval plus one execution of every other instance,
    /// each including the tick the slot stays busy after completion.
    pub fn worst_case_latency(&self) -> u32 {
        let t = &self.timing;
        let enabled_inputs = self.inputs.iter().filter(|i| i.enabled()).count() as u32;
        let mut busy = enabled_inputs * (LEVEL_STEPS + 1);

        if t.to_mode == ToMode::Test {
            for channel in [Role::A, Role::B] {
                let has_contact = self
                    .topology
                    .channel_inputs(channel)
                    .any(|p| self.input(p).is_some_and(|i| i.enabled() && i.contact()));
                if has_contact {
                    busy += t.to_pulse + TO_RECOVERY_TICKS as u32 + 2;
                }
            }
        }

        let mut any_output = false;
        for output in self.outputs.iter().filter(|o| o.enabled()) {
            any_output = true;
            busy += output.hs_offset as u32 + 3;
        }
        if any_output {
            busy += VSUP_STEPS + 1;
        }

        let max_cyclic = t
            .level_cyclic
            .max(t.to_cyclic)
            .max(t.hs_cyclic)
            .max(t.vsup_cyclic);
        max_cyclic + busy
    }

    #[inline]
    pub fn input(&self, pin: PinId) -> Option<&InputSettings> {
        self.inputs.get(pin as usize)
    }

    #[inline]
    pub fn output(&self, pin: PinId) -> Option<&OutputSettings> {
        self.outputs.get(pin as usize)
    }
}

/// Level-Test step count (set-pulse, readback, end).
const LEVEL_STEPS: u32 = 3;
/// VSUP-Test step count including the life-signal settle.
const VSUP_STEPS: u32 = 5 + VSUP_LIFE_SETTLE_TICKS as u32;

fn validate_pairs(settings: &DeviceSettings) -> Result<(), ConfigError> {
    for (idx, input) in settings.inputs.iter().enumerate() {
        if !input.dual() {
            continue;
        }
        let pin = idx as PinId;
        let Some(partner) = settings.topology.partner_di(pin) else {
            return Err(ConfigError::ValidationError(format!(
                "input {pin}: dual_channel partner {} missing",
                pin ^ 1
            )));
        };
        let Some(other) = settings.input(partner) else {
            continue;
        };
        if !other.dual() {
            return Err(ConfigError::ValidationError(format!(
                "input {pin}: partner {partner} is not dual_channel"
            )));
        }
        if other.consistency_ticks != input.consistency_ticks {
            return Err(ConfigError::ValidationError(format!(
                "inputs {pin}/{partner}: consistency filter differs"
            )));
        }
        if other.enabled() != input.enabled() {
            return Err(ConfigError::ValidationError(format!(
                "inputs {pin}/{partner}: pair members must both be enabled or disabled"
            )));
        }
    }
    for (idx, output) in settings.outputs.iter().enumerate() {
        if !output.dual() {
            continue;
        }
        let pin = idx as PinId;
        let paired = settings
            .topology
            .partner_do(pin)
            .and_then(|p| settings.output(p))
            .is_some_and(|o| o.dual());
        if !paired {
            return Err(ConfigError::ValidationError(format!(
                "output {pin}: dual_channel partner missing or single-channel"
            )));
        }
    }
    Ok(())
}

/// Milliseconds to ticks, rounded up, at least one tick.
pub fn ms_to_ticks(ms: u32, cycle_time_us: u32) -> u32 {
    let us = ms as u64 * 1000;
    let cycle = cycle_time_us.max(1) as u64;
    let ticks = us.div_ceil(cycle);
    ticks.clamp(1, u32::MAX as u64) as u32
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Complete validated configuration bundle, ready for runtime use.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub device: DeviceConfig,
    pub settings: DeviceSettings,
}

/// Load and validate the device configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let device = DeviceConfig::load(path)?;
    let settings = DeviceSettings::from_config(&device)?;
    Ok(LoadedConfig { device, settings })
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml: &str) -> Result<LoadedConfig, ConfigError> {
    let device = DeviceConfig::from_toml(toml)?;
    let settings = DeviceSettings::from_config(&device)?;
    Ok(LoadedConfig { device, settings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[shared]
service_name = "unit"

[diag]
level_cyclic_ms = 100
to_cyclic_ms = 100
hs_cyclic_ms = 100
vsup_cyclic_ms = 100
watchdog_ms = 1000
hs_timeout_ms = 1000

[[inputs]]
pin = 0
dual_channel = true
consistency_filter_ms = 3

[[inputs]]
pin = 1
dual_channel = true
consistency_filter_ms = 3

[[outputs]]
pin = 0
test_offset = 2
ss1_delay_ms = 5
"#
    }

    #[test]
    fn load_valid_config() {
        let loaded = load_config_from_str(minimal_toml()).unwrap();
        let s = &loaded.settings;
        assert_eq!(s.topology.di_count(), 2);
        assert_eq!(s.topology.do_count(), 1);
        assert_eq!(s.inputs[0].consistency_ticks, 3);
        assert!(s.inputs[1].dual());
        assert_eq!(s.outputs[0].hs_offset, 2);
        assert_eq!(s.outputs[0].ss1_ticks, 5);
        assert_eq!(s.timing.level_cyclic, 100);
    }

    #[test]
    fn ms_conversion_rounds_up() {
        assert_eq!(ms_to_ticks(1, 1000), 1);
        assert_eq!(ms_to_ticks(3, 2000), 2);
        assert_eq!(ms_to_ticks(0, 1000), 1);
        assert_eq!(ms_to_ticks(10, 500), 20);
    }

    #[test]
    fn reject_non_contiguous_pins() {
        let toml = r#"
[shared]
service_name = "unit"

[[inputs]]
pin = 1
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("contiguous")));
    }

    #[test]
    fn reject_unpaired_dual_channel() {
        let toml = r#"
[shared]
service_name = "unit"

[[inputs]]
pin = 0
dual_channel = true
"#;
        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn reject_mismatched_filter() {
        let toml = minimal_toml().replacen("consistency_filter_ms = 3", "consistency_filter_ms = 4", 1);
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(err.to_string().contains("consistency filter differs"));
    }

    #[test]
    fn reject_short_watchdog() {
        let toml = minimal_toml().replace("watchdog_ms = 1000", "watchdog_ms = 50");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(err.to_string().contains("watchdog"));
    }

    #[test]
    fn reject_empty_service_name() {
        let toml = minimal_toml().replace("service_name = \"unit\"", "service_name = \"\"");
        assert!(matches!(
            load_config_from_str(&toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn reject_malformed_toml() {
        assert!(matches!(
            load_config_from_str("[shared"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn worst_case_latency_grows_with_pins() {
        let small = DeviceSettings::uniform(1, 0).worst_case_latency();
        let large = DeviceSettings::uniform(8, 4).worst_case_latency();
        assert!(large > small);
        assert!(small > DiagTiming::default().level_cyclic);
    }

    #[test]
    fn uniform_settings_validate() {
        assert!(DeviceSettings::uniform(4, 2).validate().is_ok());
    }
}
