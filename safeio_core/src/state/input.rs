//! Safety input state machine.
//!
//! ```text
//! Inactive ──(reads active)──▶ ActiveWaitTest ──(first Level-Test Ok)──▶ ActiveTestedValid
//!    ▲                               │                                        │
//!    └──────(reads inactive, no test in flight)──────────────────────────────┘
//!
//! any ──(main qualifier Error, no test in flight)──▶ Error ──(reset edge)──▶ Inactive
//! ```
//!
//! `DontUse` is selected at init for disabled inputs and never left.

use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, Qualifier, TestState};
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::PinId;
use tracing::{error, info};

use crate::rds::Rds;

/// Everything the input FSM reads for one pin in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputView {
    /// Committed value of the owning channel.
    pub value: bool,
    /// Merged main qualifier of both controllers.
    pub main: Qualifier,
    /// Merged Level-Test qualifier of both controllers.
    pub level: Qualifier,
    /// A Level- or TO-Test is in flight on this pin.
    pub touched: bool,
    /// Level-Test schedule state.
    pub level_state: TestState,
    /// Accepted reset edge for this pin.
    pub reset: bool,
}

/// Side effect the context must apply after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    /// Went active: request a first Level-Test.
    Activated,
    /// Went inactive: forget test history and restart the Level schedule.
    Deactivated,
    /// First Level-Test passed.
    Promoted,
    /// First Level-Test finished without Ok: request another one.
    RetryFirst,
    Faulted,
    /// Reset accepted: clear qualifiers, counters and the pair's
    /// consistency history.
    Recovered,
}

#[derive(Debug, Clone, Copy)]
pub struct InputFsm {
    state: Rds<InputState>,
    flags: PinFlags,
}

impl InputFsm {
    pub fn new(flags: PinFlags) -> Self {
        let initial = if flags.contains(PinFlags::ENABLED) {
            InputState::Inactive
        } else {
            InputState::DontUse
        };
        Self {
            state: Rds::new(initial),
            flags,
        }
    }

    #[inline]
    pub fn state(&self) -> Result<InputState, FatalFault> {
        self.state.get()
    }

    #[inline]
    pub fn dual(&self) -> bool {
        self.flags.contains(PinFlags::DUAL_CHANNEL)
    }

    /// Advance one tick.
    pub fn step(&mut self, pin: PinId, view: &InputView) -> Result<InputAction, FatalFault> {
        let state = self.state.get()?;
        let (next, action) = self.transition(state, view);
        if next != state {
            self.state.set(next);
            match action {
                InputAction::Faulted => error!(pin, from = ?state, "input error"),
                _ => info!(pin, from = ?state, to = ?next, "input state"),
            }
        }
        Ok(action)
    }

    fn transition(&self, state: InputState, view: &InputView) -> (InputState, InputAction) {
        use InputState::*;

        if state == DontUse {
            return (DontUse, InputAction::None);
        }
        if state == Error {
            let auto = self.flags.contains(PinFlags::AUTO_RESET) && !view.value;
            if !view.touched && (view.reset || auto) {
                return (Inactive, InputAction::Recovered);
            }
            return (Error, InputAction::None);
        }
        if view.main.is_error() && !view.touched {
            return (Error, InputAction::Faulted);
        }

        match state {
            Inactive if view.value => (ActiveWaitTest, InputAction::Activated),
            ActiveWaitTest | ActiveTestedValid if !view.value && !view.touched => {
                (Inactive, InputAction::Deactivated)
            }
            ActiveWaitTest if view.level_state == TestState::WaitCyclic => {
                if view.level == Qualifier::Ok {
                    (ActiveTestedValid, InputAction::Promoted)
                } else {
                    (ActiveWaitTest, InputAction::RetryFirst)
                }
            }
            other => (other, InputAction::None),
        }
    }
}

/// Whether an input may be reported active.
///
/// A dual-channel input additionally requires its partner to be tested
/// valid and neither member to carry an Error qualifier.
pub fn reported(
    state: InputState,
    dual: bool,
    partner: Option<(InputState, Qualifier)>,
    main: Qualifier,
) -> bool {
    if state != InputState::ActiveTestedValid {
        return false;
    }
    if !dual {
        return true;
    }
    match partner {
        Some((partner_state, partner_main)) => {
            partner_state == InputState::ActiveTestedValid
                && !main.is_error()
                && !partner_main.is_error()
        }
        None => false,
    }
}
