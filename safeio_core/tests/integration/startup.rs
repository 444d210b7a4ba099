//! Start-up: inputs become reportable only after their first Level-Test.

use safeio_common::diag::state::{InputState, OutputState};
use safeio_common::io::config::PinFlags;
use safeio_core::config::DeviceSettings;

use super::harness::{activate, both_roles, dual_inputs, pair};

#[test]
fn single_inputs_report_after_first_level_test() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    activate(&mut pair, &[0, 1]);

    pair.run(3).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveWaitTest));
    assert_eq!(pair.input_state(1), Ok(InputState::ActiveWaitTest));
    assert!(!pair.reported(0));

    pair.run(4).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
    assert!(pair.reported(0));
    // Pin 1 waited for the main slot.
    assert!(!pair.reported(1));

    pair.run(3).unwrap();
    assert!(!pair.reported(1));
    pair.run(1).unwrap();
    assert!(pair.reported(1));
}

#[test]
fn dual_pair_reports_once_both_members_are_tested() {
    let mut pair = pair(&dual_inputs(2, 0, 0));
    activate(&mut pair, &[0, 1]);

    pair.run(7).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
    assert!(!pair.reported(0));

    pair.run(2).unwrap();
    assert!(!pair.reported(0));
    pair.run(1).unwrap();
    assert!(pair.reported(0));
    assert!(pair.reported(1));
}

#[test]
fn both_controllers_agree_on_states() {
    let mut pair = pair(&DeviceSettings::uniform(4, 2));
    activate(&mut pair, &[0, 1, 2, 3]);
    pair.payload_mut().request_output(0, true);
    pair.run(40).unwrap();

    for role in both_roles() {
        let cx = pair.context(role);
        for pin in 0..4 {
            assert_eq!(cx.input_state(pin), Ok(InputState::ActiveTestedValid));
        }
        assert_eq!(cx.output_state(0), Ok(OutputState::Active));
        assert_eq!(cx.output_state(1), Ok(OutputState::Inactive));
    }
    assert!(pair.output_energised(0));
    assert!(!pair.output_energised(1));
}

#[test]
fn disabled_pins_stay_unused() {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.inputs[1].flags = PinFlags::empty();
    settings.outputs[1].flags = PinFlags::empty();
    let mut pair = pair(&settings);
    activate(&mut pair, &[0, 1]);
    pair.payload_mut().request_output(1, true);

    pair.run(20).unwrap();
    assert_eq!(pair.input_state(1), Ok(InputState::DontUse));
    assert!(!pair.reported(1));
    assert_eq!(pair.output_state(1), Ok(OutputState::DontUse));
    assert!(!pair.output_energised(1));
    assert!(pair.reported(0));
}

#[test]
fn sequences_advance_in_lock_step() {
    let mut pair = pair(&DeviceSettings::uniform(2, 2));
    pair.run(25).unwrap();
    for role in both_roles() {
        assert_eq!(pair.context(role).image().sequence, 25);
    }
}
