//! Board faults on inputs: stuck channels and cross-channel shorts.

use safeio_common::diag::state::{InputState, Qualifier};
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::Role;
use safeio_core::config::DeviceSettings;
use safeio_core::sim::{DiFault, SimFault};

use super::harness::{activate, owner, pair, step_until};

#[test]
fn stuck_active_input_is_never_reported() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));

    let mut ever_reported = false;
    let took = step_until(&mut pair, 40, |p| {
        ever_reported |= p.reported(0);
        p.input_state(0) == Ok(InputState::Error)
    });
    assert!(took.is_some(), "stuck input never confirmed");
    assert!(!ever_reported);
    assert_eq!(
        pair.context(Role::A).qualifiers().inputs[0].level.qualifier(),
        Ok(Qualifier::Error)
    );

    // Error holds without a reset.
    pair.run(30).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Error));
    assert!(!pair.reported(0));
}

#[test]
fn transient_level_failure_stays_below_limit() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));
    // First failed test only.
    pair.run(5).unwrap();
    pair.board_mut().clear_faults();
    activate(&mut pair, &[0]);

    let took = step_until(&mut pair, 30, |p| p.reported(0));
    assert!(took.is_some());
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
}

#[test]
fn stuck_inactive_input_never_activates() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    activate(&mut pair, &[0]);
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckInactive));

    pair.run(20).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));
    assert!(!pair.reported(0));
}

#[test]
fn short_between_channel_inputs_is_confirmed() {
    let mut settings = DeviceSettings::uniform(4, 0);
    settings.limits.short = 1;
    let mut pair = pair(&settings);
    activate(&mut pair, &[0, 2]);
    pair.board_mut().inject(SimFault::Short(0, 2));

    let took = step_until(&mut pair, 20, |p| {
        p.input_state(0) == Ok(InputState::Error)
    });
    assert!(took.is_some(), "short never confirmed");
    let quals = &pair.context(Role::A).qualifiers().inputs[0];
    assert_eq!(quals.short.qualifier(), Ok(Qualifier::Error));
    assert_eq!(quals.level.qualifier(), Ok(Qualifier::Ok));
    assert!(!pair.reported(0));
}

#[test]
fn healthy_neighbours_pass_short_check() {
    let mut settings = DeviceSettings::uniform(4, 0);
    settings.limits.short = 1;
    let mut pair = pair(&settings);
    activate(&mut pair, &[0, 2]);

    pair.run(30).unwrap();
    assert!(pair.reported(0));
    assert!(pair.reported(2));
    assert_eq!(
        pair.context(Role::A).qualifiers().inputs[0].short.qualifier(),
        Ok(Qualifier::Ok)
    );
}

#[test]
fn deactivation_forgets_pending_test_failures() {
    let mut settings = DeviceSettings::uniform(2, 0);
    for input in settings.inputs.iter_mut() {
        input.flags |= PinFlags::CONTACT;
    }
    settings.timing.to_cyclic = 10;
    settings.timing.level_cyclic = 20;
    settings.limits.level = 10;
    settings.limits.to = 10;
    let mut pair = pair(&settings);
    activate(&mut pair, &[0]);
    pair.run(8).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));

    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));
    let took = step_until(&mut pair, 80, |p| {
        let quals = &owner(p, 0).qualifiers().inputs[0];
        quals.level.count().is_ok_and(|n| n >= 1) && quals.to.count().is_ok_and(|n| n >= 1)
    });
    assert!(took.is_some(), "Level and TO failures never recorded");
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));

    pair.board_mut().clear_faults();
    pair.board_mut().set_field(0, false);
    let took = step_until(&mut pair, 10, |p| !owner(p, 0).image().di_value(0));
    assert!(took.is_some(), "input value never dropped");
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));

    // The FSM sees the committed value on the next tick.
    pair.try_step().unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));
    let quals = &owner(&pair, 0).qualifiers().inputs[0];
    assert_eq!(quals.level.count(), Ok(0));
    assert_eq!(quals.to.count(), Ok(0));
    assert!(!pair.reported(0));
}
