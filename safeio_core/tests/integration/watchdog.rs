//! Fatal faults: a test that stops running for a whole watchdog period
//! stops the device.

use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, OutputState, TestKind};
use safeio_core::config::DeviceSettings;

use super::harness::{PanicFailSafe, activate, pair};

fn starved_level_test() -> DeviceSettings {
    let mut settings = DeviceSettings::uniform(1, 0);
    settings.timing.watchdog = 50;
    settings.timing.level_cyclic = 1000;
    settings
}

#[test]
fn overdue_level_test_is_fatal() {
    let mut pair = pair(&starved_level_test());
    activate(&mut pair, &[0]);

    let result = pair.run(200);
    assert_eq!(
        result,
        Err(FatalFault::DiagnosticTimeout {
            test: TestKind::LEVEL,
            index: 0,
        })
    );
    assert!(pair.cycle() < 200);
}

#[test]
fn busy_device_within_bound_never_times_out() {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.timing.level_cyclic = 20;
    settings.timing.hs_cyclic = 20;
    settings.timing.vsup_cyclic = 20;
    settings.timing.watchdog = 60;
    assert!(settings.validate().is_ok());

    let mut pair = pair(&settings);
    activate(&mut pair, &[0, 1]);
    pair.payload_mut().request_output(0, true);
    pair.payload_mut().request_output(1, true);
    assert_eq!(pair.run(500), Ok(()));
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
    assert_eq!(pair.output_state(1), Ok(OutputState::Active));
}

#[test]
#[should_panic(expected = "safe state")]
fn fatal_fault_reaches_fail_safe() {
    let mut pair = pair(&starved_level_test());
    activate(&mut pair, &[0]);
    let mut failsafe = PanicFailSafe;
    for _ in 0..200 {
        pair.step(&mut failsafe);
    }
}
