//! Output switching: HS-Test, VSUP cutoff test, pin-state check and SS1-t.

use safeio_common::diag::state::{OutputState, Qualifier};
use safeio_common::io::pin::Role;
use safeio_core::config::DeviceSettings;
use safeio_core::sim::SimFault;

use super::harness::{both_roles, owner, pair, step_until};

// ── HS-Test and pin-state check ─────────────────────────────────────

#[test]
fn requested_output_energises_after_first_hs_test() {
    let mut pair = pair(&DeviceSettings::uniform(2, 2));
    pair.payload_mut().request_output(0, true);

    pair.run(2).unwrap();
    assert_eq!(pair.output_state(0), Ok(OutputState::Active));
    assert!(!pair.output_energised(0));

    let took = step_until(&mut pair, 10, |p| p.output_energised(0));
    assert!(took.is_some());
    assert_eq!(
        owner(&pair, 0).qualifiers().outputs[0].hs.qualifier(),
        Ok(Qualifier::Ok)
    );

    pair.payload_mut().request_output(0, false);
    pair.run(2).unwrap();
    assert_eq!(pair.output_state(0), Ok(OutputState::Inactive));
    assert!(!pair.output_energised(0));
}

#[test]
fn stuck_driver_fails_pin_state_check() {
    let mut pair = pair(&DeviceSettings::uniform(2, 2));
    pair.board_mut().inject(SimFault::HsStuck(0));

    let took = step_until(&mut pair, 20, |p| p.output_state(0) == Ok(OutputState::Error));
    assert!(took.is_some(), "stuck driver never confirmed");
    assert_eq!(
        owner(&pair, 0).qualifiers().outputs[0].pin_check.qualifier(),
        Ok(Qualifier::Error)
    );
    assert_eq!(pair.output_state(1), Ok(OutputState::Inactive));
}

#[test]
fn hs_test_detects_driver_stuck_while_on() {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.timing.hs_cyclic = 20;
    settings.limits.hs = 1;
    let mut pair = pair(&settings);
    pair.payload_mut().request_output(0, true);
    pair.run(10).unwrap();
    assert!(pair.output_energised(0));

    pair.board_mut().inject(SimFault::HsStuck(0));
    let took = step_until(&mut pair, 60, |p| p.output_state(0) == Ok(OutputState::Error));
    assert!(took.is_some(), "HS-Test never failed");
    assert_eq!(
        owner(&pair, 0).qualifiers().outputs[0].hs.qualifier(),
        Ok(Qualifier::Error)
    );
    // Off command despite the request.
    assert!(!owner(&pair, 0).commanded(0));
}

#[test]
fn confirmed_hs_error_switches_output_off_in_same_tick() {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.timing.hs_cyclic = 20;
    settings.limits.hs = 1;
    let mut pair = pair(&settings);
    pair.payload_mut().request_output(0, true);
    pair.run(10).unwrap();
    assert!(owner(&pair, 0).commanded(0));

    pair.board_mut().inject(SimFault::HsStuck(0));
    let mut confirmed = false;
    for _ in 0..60 {
        pair.try_step().unwrap();
        let ctx = owner(&pair, 0);
        if ctx.qualifiers().outputs[0].hs.qualifier() == Ok(Qualifier::Error) {
            assert_eq!(ctx.output_state(0), Ok(OutputState::Error));
            assert!(!ctx.commanded(0));
            confirmed = true;
            break;
        }
    }
    assert!(confirmed, "HS-Test never failed");
}

// ── VSUP cutoff test ────────────────────────────────────────────────

fn vsup_settings() -> DeviceSettings {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.timing.vsup_cyclic = 20;
    settings.limits.vsup = 1;
    settings
}

#[test]
fn healthy_cutoff_passes_vsup_test() {
    let mut pair = pair(&vsup_settings());
    pair.payload_mut().request_output(1, true);

    pair.run(60).unwrap();
    for role in both_roles() {
        assert_eq!(
            pair.context(role).qualifiers().vsup.qualifier(),
            Ok(Qualifier::Ok)
        );
    }
    assert_eq!(pair.output_state(1), Ok(OutputState::Active));
    assert!(pair.board().life_toggles(Role::B) >= 1);
}

#[test]
fn stuck_cutoff_switches_outputs_off_in_same_tick() {
    let mut pair = pair(&vsup_settings());
    pair.payload_mut().request_output(1, true);
    pair.board_mut().inject(SimFault::VsupStuck);

    let mut confirmed = None;
    for _ in 0..60 {
        let was_commanded = owner(&pair, 1).commanded(1);
        pair.try_step().unwrap();
        if pair.output_state(1) == Ok(OutputState::Error) {
            confirmed = Some((was_commanded, owner(&pair, 1).commanded(1)));
            break;
        }
    }
    assert_eq!(confirmed, Some((true, false)));
    for role in both_roles() {
        assert_eq!(
            pair.context(role).qualifiers().vsup.qualifier(),
            Ok(Qualifier::Error)
        );
    }
}

#[test]
fn vsup_runs_alternate_the_asserting_controller() {
    let mut pair = pair(&vsup_settings());
    pair.payload_mut().request_output(1, true);

    let mut testers = Vec::new();
    let mut asserted = [false; 2];
    for _ in 0..80 {
        pair.try_step().unwrap();
        for role in both_roles() {
            let now = pair.board().vsup_test(role);
            if now && !asserted[role.index()] {
                testers.push(role);
            }
            asserted[role.index()] = now;
        }
        assert!(!(asserted[0] && asserted[1]), "both controllers asserting");
    }
    assert!(testers.len() >= 2, "fewer than two VSUP runs: {testers:?}");
    assert_eq!(testers[..2], [Role::A, Role::B]);
    assert!(pair.board().life_toggles(Role::B) >= 2);
    assert_eq!(pair.board().life_toggles(Role::A), 0);
    for role in both_roles() {
        assert_eq!(
            pair.context(role).qualifiers().vsup.qualifier(),
            Ok(Qualifier::Ok)
        );
    }
}

#[test]
fn vsup_test_without_active_outputs_only_toggles_life_signal() {
    let mut pair = pair(&vsup_settings());

    pair.run(60).unwrap();
    assert!(pair.board().life_toggles(Role::B) >= 1);
    assert_eq!(pair.board().life_toggles(Role::A), 0);
    assert_eq!(
        pair.context(Role::A).qualifiers().vsup.qualifier(),
        Ok(Qualifier::NotAvailable)
    );
    assert_eq!(pair.output_state(0), Ok(OutputState::Inactive));
}

// ── SS1-t ───────────────────────────────────────────────────────────

#[test]
fn ss1_delay_holds_output_after_request_drops() {
    let mut settings = DeviceSettings::uniform(2, 2);
    settings.outputs[0].ss1_ticks = 5;
    let mut pair = pair(&settings);
    pair.payload_mut().request_output(0, true);
    pair.run(10).unwrap();
    assert!(pair.output_energised(0));

    pair.payload_mut().request_output(0, false);
    for _ in 0..5 {
        pair.try_step().unwrap();
        assert_eq!(pair.output_state(0), Ok(OutputState::Active));
        assert!(pair.output_energised(0));
    }
    pair.try_step().unwrap();
    assert_eq!(pair.output_state(0), Ok(OutputState::Inactive));
    assert!(!pair.output_energised(0));
}
