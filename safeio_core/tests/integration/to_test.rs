//! TO-Test on contact inputs fed from the sibling's test output line.

use safeio_common::diag::config::ToMode;
use safeio_common::diag::state::{InputState, Qualifier};
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::Role;
use safeio_core::config::DeviceSettings;
use safeio_core::sim::SimFault;

use super::harness::{activate, owner, pair, step_until};

fn contacts(to_mode: ToMode) -> DeviceSettings {
    let mut settings = DeviceSettings::uniform(2, 0);
    for input in settings.inputs.iter_mut() {
        input.flags |= PinFlags::CONTACT;
    }
    settings.timing.to_cyclic = 10;
    settings.timing.to_mode = to_mode;
    settings
}

#[test]
fn healthy_contacts_pass_to_test() {
    let mut pair = pair(&contacts(ToMode::Test));
    activate(&mut pair, &[0, 1]);

    pair.run(60).unwrap();
    for pin in 0..2 {
        assert_eq!(pair.input_state(pin), Ok(InputState::ActiveTestedValid));
        assert!(pair.reported(pin));
        assert_eq!(
            owner(&pair, pin).qualifiers().inputs[pin as usize].to.qualifier(),
            Ok(Qualifier::Ok)
        );
    }
}

#[test]
fn contact_bypassing_to_line_is_confirmed() {
    let mut settings = contacts(ToMode::Test);
    settings.limits.to = 1;
    let mut pair = pair(&settings);
    activate(&mut pair, &[0, 1]);
    pair.run(12).unwrap();
    assert!(pair.reported(0));

    pair.board_mut().inject(SimFault::ToBypass(0));
    let took = step_until(&mut pair, 40, |p| p.input_state(0) == Ok(InputState::Error));
    assert!(took.is_some(), "bypassed contact never confirmed");
    let quals = &owner(&pair, 0).qualifiers().inputs[0];
    assert_eq!(quals.to.qualifier(), Ok(Qualifier::Error));
    // The Level-Test pulse still reaches the input.
    assert_ne!(quals.level.qualifier(), Ok(Qualifier::Error));
    assert!(pair.reported(1));
}

#[test]
fn forced_off_lines_keep_contacts_inactive() {
    let mut pair = pair(&contacts(ToMode::AlwaysOff));
    activate(&mut pair, &[0, 1]);

    pair.run(20).unwrap();
    assert!(!pair.board().to_line(Role::A));
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));
    assert_eq!(pair.input_state(1), Ok(InputState::Inactive));
}

#[test]
fn forced_on_lines_skip_to_test() {
    let mut pair = pair(&contacts(ToMode::AlwaysOn));
    activate(&mut pair, &[0, 1]);

    pair.run(60).unwrap();
    assert!(pair.reported(0));
    assert_eq!(
        owner(&pair, 0).qualifiers().inputs[0].to.qualifier(),
        Ok(Qualifier::NotAvailable)
    );
}
