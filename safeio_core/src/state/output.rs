//! Safety output state machine.
//!
//! The requested level is honoured only while the output's qualifier is not
//! Error. A confirmed Error switches the output off in the tick it is
//! detected; a normal off request may be delayed by the SS1-t time. After
//! an HS-Test the output stays off for a settle tick before re-energising.

use core::cell::Cell;

use critical_section::Mutex;
use safeio_common::consts::HS_SETTLE_TICKS;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{OutputState, Qualifier};
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::PinId;
use tracing::{error, info};

use crate::config::OutputSettings;
use crate::rds::Rds;

// ─── Active-Cycle Counter ───────────────────────────────────────────

/// Continuous Active duration in ticks.
///
/// Shared with interrupt context, so every access goes through a critical
/// section.
pub struct ActiveCycleCounter {
    cycles: Mutex<Cell<Rds<u32>>>,
}

impl ActiveCycleCounter {
    pub fn new() -> Self {
        Self {
            cycles: Mutex::new(Cell::new(Rds::new(0))),
        }
    }

    pub fn increment(&self) {
        critical_section::with(|cs| {
            let cell = self.cycles.borrow(cs);
            let mut value = cell.get();
            value.inc();
            cell.set(value);
        });
    }

    pub fn reset(&self) {
        critical_section::with(|cs| self.cycles.borrow(cs).set(Rds::new(0)));
    }

    pub fn sample(&self) -> Result<u32, FatalFault> {
        critical_section::with(|cs| self.cycles.borrow(cs).get().get())
    }
}

impl Default for ActiveCycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ActiveCycleCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveCycleCounter")
            .field("cycles", &self.sample())
            .finish()
    }
}

// ─── Output FSM ─────────────────────────────────────────────────────

/// Inputs of the output FSM for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputView {
    pub request: bool,
    /// Merged committed main qualifier.
    pub main: Qualifier,
    pub reset: bool,
}

/// Side effect the context must apply after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    None,
    Faulted,
    /// Reset accepted: clear qualifiers and counters.
    Recovered,
}

#[derive(Debug)]
pub struct OutputFsm {
    state: Rds<OutputState>,
    ss1_elapsed: Rds<u32>,
    settle: Rds<u8>,
    active_cycles: ActiveCycleCounter,
    ss1_ticks: u32,
}

impl OutputFsm {
    pub fn new(settings: &OutputSettings) -> Self {
        let initial = if settings.flags.contains(PinFlags::ENABLED) {
            OutputState::Inactive
        } else {
            OutputState::DontUse
        };
        Self {
            state: Rds::new(initial),
            ss1_elapsed: Rds::new(0),
            settle: Rds::new(0),
            active_cycles: ActiveCycleCounter::new(),
            ss1_ticks: settings.ss1_ticks,
        }
    }

    #[inline]
    pub fn state(&self) -> Result<OutputState, FatalFault> {
        self.state.get()
    }

    #[inline]
    pub fn active_cycles(&self) -> &ActiveCycleCounter {
        &self.active_cycles
    }

    fn enter(&mut self, pin: PinId, from: OutputState, to: OutputState) {
        self.state.set(to);
        self.ss1_elapsed.set(0);
        if to != OutputState::Active {
            self.active_cycles.reset();
        }
        if to == OutputState::Error {
            error!(output = pin, ?from, "output error");
        } else {
            info!(output = pin, ?from, ?to, "output state");
        }
    }

    /// Advance one tick, before the test engines run.
    pub fn step(&mut self, pin: PinId, view: &OutputView) -> Result<OutputAction, FatalFault> {
        use OutputState::*;

        let state = self.state.get()?;
        match state {
            DontUse => Ok(OutputAction::None),
            Error => {
                if view.reset && !view.request {
                    self.enter(pin, Error, Inactive);
                    return Ok(OutputAction::Recovered);
                }
                Ok(OutputAction::None)
            }
            _ if view.main.is_error() => {
                self.enter(pin, state, Error);
                Ok(OutputAction::Faulted)
            }
            Inactive => {
                if view.request {
                    self.enter(pin, Inactive, Active);
                    self.active_cycles.increment();
                }
                Ok(OutputAction::None)
            }
            Active => {
                if view.request {
                    self.ss1_elapsed.set(0);
                } else {
                    self.ss1_elapsed.inc();
                    if self.ss1_elapsed.get()? > self.ss1_ticks {
                        self.enter(pin, Active, Inactive);
                        return Ok(OutputAction::None);
                    }
                }
                self.active_cycles.increment();
                Ok(OutputAction::None)
            }
        }
    }

    /// Switch to Error in the tick a test confirmed it.
    pub fn sweep(&mut self, pin: PinId, live: Qualifier) -> Result<bool, FatalFault> {
        let state = self.state.get()?;
        if live.is_error() && matches!(state, OutputState::Inactive | OutputState::Active) {
            self.enter(pin, state, OutputState::Error);
            return Ok(true);
        }
        Ok(false)
    }

    /// HS-Test finished: hold off for the settle time and restart the
    /// active-cycle count.
    pub fn hs_completed(&mut self) {
        self.settle.set(HS_SETTLE_TICKS + 1);
        self.active_cycles.reset();
    }

    /// Driver command for this tick.
    ///
    /// `hs_in_flight` blocks the command while this output is under test;
    /// `partner_error` blocks a dual-channel member whose partner faulted.
    pub fn command(&mut self, hs_in_flight: bool, partner_error: bool) -> Result<bool, FatalFault> {
        let settling = self.settle.get()? > 0;
        if settling {
            self.settle.dec();
        }
        Ok(self.state.get()? == OutputState::Active && !hs_in_flight && !settling && !partner_error)
    }
}
