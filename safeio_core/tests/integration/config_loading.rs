//! Configuration files through to a running pair.

use std::io::Write;
use std::path::{Path, PathBuf};

use safeio_common::config::ConfigError;
use safeio_common::diag::state::InputState;
use safeio_core::config::{load_config, load_config_from_str};
use tempfile::NamedTempFile;

use super::harness::{activate, pair};

fn shipped_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/safeio.toml")
}

const TWO_CONTACTS: &str = r#"
[shared]
service_name = "bench-rig"
log_level = "debug"

[diag]
cycle_time_us = 500
level_cyclic_ms = 50
to_cyclic_ms = 50
to_timing = "short"
hs_cyclic_ms = 50
vsup_cyclic_ms = 50
watchdog_ms = 200
hs_timeout_ms = 400

[[inputs]]
pin = 0
dual_channel = true
kind = "contact"
consistency_filter_ms = 5

[[inputs]]
pin = 1
dual_channel = true
kind = "contact"
consistency_filter_ms = 5

[[outputs]]
pin = 0
test_offset = 1
"#;

#[test]
fn shipped_config_loads_and_runs() {
    let loaded = load_config(&shipped_config()).unwrap();
    let s = &loaded.settings;
    assert_eq!(s.topology.di_count(), 4);
    assert_eq!(s.topology.do_count(), 2);
    assert!(s.inputs[0].contact());
    assert!(!s.inputs[2].contact());
    assert_eq!(s.inputs[0].consistency_ticks, 20);
    assert_eq!(s.timing.to_pulse, 4);
    assert_eq!(s.outputs[0].ss1_ticks, 50);

    let mut pair = pair(s);
    pair.run(100).unwrap();
}

#[test]
fn config_file_drives_pair() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(TWO_CONTACTS.as_bytes()).unwrap();

    let loaded = load_config(file.path()).unwrap();
    assert_eq!(loaded.device.shared.service_name, "bench-rig");
    let s = &loaded.settings;
    // 500 µs cycle: milliseconds double into ticks.
    assert_eq!(s.timing.level_cyclic, 100);
    assert_eq!(s.timing.watchdog, 400);
    assert_eq!(s.inputs[1].consistency_ticks, 10);

    let mut pair = pair(s);
    activate(&mut pair, &[0, 1]);
    pair.run(60).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
    assert!(pair.reported(0));
    assert!(pair.reported(1));
}

#[test]
fn missing_file_is_reported() {
    let result = load_config(Path::new("/nonexistent/safeio.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn short_watchdog_is_rejected() {
    let toml = TWO_CONTACTS.replace("watchdog_ms = 200", "watchdog_ms = 20");
    let result = load_config_from_str(&toml);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn unpaired_dual_input_is_rejected() {
    let toml = TWO_CONTACTS.replacen("dual_channel = true", "dual_channel = false", 1);
    let result = load_config_from_str(&toml);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
