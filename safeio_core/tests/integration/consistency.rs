//! Dual-channel consistency: brief discrepancies are filtered, lasting ones
//! fault both members of the pair.

use safeio_common::diag::state::InputState;
use safeio_core::sim::LockstepPair;

use super::harness::{activate, dual_inputs, pair, step_until};

const FILTER: u32 = 3;

fn running_pair() -> LockstepPair {
    let mut pair = pair(&dual_inputs(2, 0, FILTER));
    activate(&mut pair, &[0, 1]);
    pair.run(15).unwrap();
    assert!(pair.reported(0) && pair.reported(1));
    pair
}

fn any_error(pair: &LockstepPair) -> bool {
    pair.input_state(0) == Ok(InputState::Error) || pair.input_state(1) == Ok(InputState::Error)
}

/// Drop the field of pin 1 for `cycles`, then restore it.
fn drop_second_member(pair: &mut LockstepPair, cycles: u32) {
    pair.board_mut().set_field(1, false);
    pair.run(cycles).unwrap();
    pair.board_mut().set_field(1, true);
}

#[test]
fn discrepancy_confirmed_exactly_at_filter_time() {
    let mut pair = pair(&dual_inputs(2, 0, FILTER));
    activate(&mut pair, &[0, 1]);

    let took = step_until(&mut pair, 5, |p| {
        p.input_state(0) == Ok(InputState::ActiveWaitTest)
    });
    assert!(took.is_some(), "pin 0 never left Inactive");
    let took = step_until(&mut pair, 15, |p| {
        p.input_state(0) == Ok(InputState::ActiveTestedValid)
            && p.input_state(1) == Ok(InputState::ActiveTestedValid)
    });
    assert!(took.is_some(), "pair never tested valid");

    pair.board_mut().set_field(1, false);
    let took = step_until(&mut pair, 6, |p| p.input_state(1) == Ok(InputState::Inactive));
    assert!(took.is_some(), "pin 1 never dropped");

    // One tick short of the filter time: still ambiguous.
    for _ in 0..FILTER - 1 {
        pair.try_step().unwrap();
        assert!(!any_error(&pair));
        assert!(!pair.reported(0));
    }

    pair.try_step().unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Error));
    assert_eq!(pair.input_state(1), Ok(InputState::Error));
    assert!(!pair.reported(0));
    assert!(!pair.reported(1));
}

#[test]
fn discrepancy_one_tick_below_filter_never_faults() {
    let mut pair = running_pair();
    drop_second_member(&mut pair, FILTER - 1);

    let mut faulted = false;
    let took = step_until(&mut pair, 40, |p| {
        faulted |= any_error(p);
        p.reported(0) && p.reported(1)
    });
    assert!(took.is_some(), "pair never reported again");
    assert!(!faulted);
    pair.run(20).unwrap();
    assert!(!any_error(&pair));
}

#[test]
fn discrepancy_of_filter_length_faults() {
    let mut pair = running_pair();
    drop_second_member(&mut pair, FILTER);

    let took = step_until(&mut pair, 10, |p| {
        p.input_state(0) == Ok(InputState::Error) && p.input_state(1) == Ok(InputState::Error)
    });
    assert!(took.is_some(), "discrepancy of filter length tolerated");
}

#[test]
fn short_discrepancy_is_filtered() {
    let mut pair = running_pair();
    drop_second_member(&mut pair, 1);

    let mut faulted = false;
    let took = step_until(&mut pair, 40, |p| {
        faulted |= any_error(p);
        p.reported(0) && p.reported(1)
    });
    assert!(took.is_some(), "pair never reported again");
    assert!(!faulted);
}

#[test]
fn lasting_discrepancy_faults_both_members() {
    let mut pair = running_pair();
    pair.board_mut().set_field(1, false);

    let took = step_until(&mut pair, 2 * FILTER + 6, |p| {
        p.input_state(0) == Ok(InputState::Error)
    });
    assert!(took.is_some(), "discrepancy never confirmed");
    pair.run(2).unwrap();
    assert_eq!(pair.input_state(1), Ok(InputState::Error));
    assert!(!pair.reported(0));
    assert!(!pair.reported(1));

    // Restoring the field does not clear the fault.
    pair.board_mut().set_field(1, true);
    pair.run(10).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::Error));
    assert_eq!(pair.input_state(1), Ok(InputState::Error));
}

#[test]
fn pair_without_filter_tolerates_discrepancy() {
    let mut pair = pair(&dual_inputs(2, 0, 0));
    activate(&mut pair, &[0, 1]);
    pair.run(15).unwrap();
    pair.board_mut().set_field(1, false);

    pair.run(30).unwrap();
    assert_eq!(pair.input_state(0), Ok(InputState::ActiveTestedValid));
    assert_eq!(pair.input_state(1), Ok(InputState::Inactive));
    // Reported only while both members are active.
    assert!(!pair.reported(0));
}
