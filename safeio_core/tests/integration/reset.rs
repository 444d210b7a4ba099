//! Operator resets: per-pin and global edges out of Error.

use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, OutputState};
use safeio_core::config::DeviceSettings;
use safeio_core::sim::{DiFault, SimFault};

use super::harness::{activate, pair, step_until};

fn is_error(state: Result<InputState, FatalFault>) -> bool {
    matches!(state, Ok(InputState::Error))
}

#[test]
fn input_reset_edge_recovers_after_repair() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));
    let took = step_until(&mut pair, 40, |p| is_error(p.input_state(0)));
    assert!(took.is_some());

    pair.board_mut().clear_faults();
    pair.run(3).unwrap();
    assert!(is_error(pair.input_state(0)));

    pair.payload_mut().set_di_reset(0, true);
    pair.run(2).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));

    // Repaired input goes through its first test again.
    activate(&mut pair, &[0]);
    let took = step_until(&mut pair, 20, |p| p.reported(0));
    assert!(took.is_some());
}

#[test]
fn held_reset_does_not_retrigger() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));
    step_until(&mut pair, 40, |p| is_error(p.input_state(0))).expect("first error");

    // Reset while the fault is still present: the pin faults again.
    pair.payload_mut().set_di_reset(0, true);
    pair.run(1).unwrap();
    assert!(!is_error(pair.input_state(0)));
    step_until(&mut pair, 40, |p| is_error(p.input_state(0))).expect("second error");

    pair.board_mut().clear_faults();
    pair.run(20).unwrap();
    assert!(is_error(pair.input_state(0)));

    pair.payload_mut().set_di_reset(0, false);
    pair.run(1).unwrap();
    pair.payload_mut().set_di_reset(0, true);
    pair.run(2).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));
}

#[test]
fn global_reset_skips_pins_holding_their_own_request() {
    let mut pair = pair(&DeviceSettings::uniform(2, 0));
    // Raised before the faults; the edge passes while pin 1 is healthy.
    pair.payload_mut().set_di_reset(1, true);
    pair.board_mut()
        .inject(SimFault::Input(0, DiFault::StuckActive));
    pair.board_mut()
        .inject(SimFault::Input(1, DiFault::StuckActive));
    let took = step_until(&mut pair, 120, |p| {
        is_error(p.input_state(0)) && is_error(p.input_state(1))
    });
    assert!(took.is_some(), "both inputs never faulted");

    pair.board_mut().clear_faults();
    pair.run(3).unwrap();
    pair.payload_mut().global_reset = true;
    pair.run(2).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Inactive));
    assert!(is_error(pair.input_state(1)));

    pair.payload_mut().global_reset = false;
    pair.payload_mut().set_di_reset(1, false);
    pair.run(1).unwrap();
    pair.payload_mut().set_di_reset(1, true);
    pair.run(2).unwrap();
    assert_eq!(pair.input_state(1), Ok(InputState::Inactive));
}

#[test]
fn output_reset_needs_request_off() {
    let mut pair = pair(&DeviceSettings::uniform(2, 2));
    pair.board_mut().inject(SimFault::HsStuck(0));
    step_until(&mut pair, 20, |p| p.output_state(0) == Ok(OutputState::Error))
        .expect("output error");
    pair.board_mut().clear_faults();
    pair.run(2).unwrap();

    pair.payload_mut().request_output(0, true);
    pair.payload_mut().set_do_reset(0, true);
    pair.run(2).unwrap();
    assert_eq!(pair.output_state(0), Ok(OutputState::Error));
    assert!(!pair.output_energised(0));

    pair.payload_mut().set_do_reset(0, false);
    pair.payload_mut().request_output(0, false);
    pair.run(1).unwrap();
    pair.payload_mut().set_do_reset(0, true);
    pair.run(2).unwrap();
    assert_eq!(pair.output_state(0), Ok(OutputState::Inactive));
}
