//! Generic test scheduler and the execution-slot arbiter.
//!
//! Every test instance walks the same six-state shape. The counter counts
//! ticks in `Wait*` and step numbers in `Exec*`, and is frozen in `Req*`.
//! At most one Level/TO/HS instance holds the main slot at a time; VSUP has
//! its own slot but excludes HS because both use the discharge circuit.

use bitflags::bitflags;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::TestState;

use crate::rds::Rds;

bitflags! {
    /// Execution slots occupied at the start of a tick or claimed during it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Slots: u8 {
        /// Level, TO or HS test executing.
        const MAIN = 0x01;
        /// HS test executing (subset of MAIN).
        const HS   = 0x02;
        /// VSUP test executing.
        const VSUP = 0x04;
    }
}

/// Which slot a test competes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Main,
    Hs,
    Vsup,
}

/// Tracks slot occupancy for one tick.
///
/// `busy` is sampled before any engine runs, so a test that finishes this
/// tick still blocks acquisition until the next one.
#[derive(Debug, Default)]
pub struct TestArbiter {
    busy: Slots,
    claimed: Slots,
}

impl TestArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a tick with the slots occupied by executing tests.
    pub fn begin_tick(&mut self, busy: Slots) {
        self.busy = busy;
        self.claimed = Slots::empty();
    }

    #[inline]
    fn taken(&self) -> Slots {
        self.busy | self.claimed
    }

    /// Any Level/TO/HS test ongoing (or started this tick).
    #[inline]
    pub fn main_taken(&self) -> bool {
        self.taken().contains(Slots::MAIN)
    }

    pub fn try_claim(&mut self, kind: SlotKind) -> bool {
        let taken = self.taken();
        let free = match kind {
            SlotKind::Main => !taken.contains(Slots::MAIN),
            SlotKind::Hs => !taken.intersects(Slots::MAIN | Slots::VSUP),
            SlotKind::Vsup => !taken.intersects(Slots::VSUP | Slots::HS),
        };
        if free {
            self.claimed |= match kind {
                SlotKind::Main => Slots::MAIN,
                SlotKind::Hs => Slots::MAIN | Slots::HS,
                SlotKind::Vsup => Slots::VSUP,
            };
        }
        free
    }
}

/// Result of polling a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Not in the polled half, or already executing.
    Idle,
    /// Counting towards the threshold.
    Waiting,
    /// Threshold reached but the slot is taken.
    Parked,
    /// Moved to `Exec*` this tick.
    Started,
}

/// Which half of the shape a pass polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    First,
    Cyclic,
}

/// One test instance: state plus tick/step counter.
#[derive(Debug, Clone, Copy)]
pub struct TestSchedule {
    state: Rds<TestState>,
    counter: Rds<u32>,
    /// State `reset` returns to.
    entry: Rds<TestState>,
}

impl TestSchedule {
    /// Schedule with a first test (enters at `WaitFirst`).
    pub fn with_first() -> Self {
        Self::entering(TestState::WaitFirst)
    }

    /// Cyclic-only schedule (enters at `WaitCyclic`).
    pub fn cyclic_only() -> Self {
        Self::entering(TestState::WaitCyclic)
    }

    fn entering(entry: TestState) -> Self {
        Self {
            state: Rds::new(entry),
            counter: Rds::new(0),
            entry: Rds::new(entry),
        }
    }

    #[inline]
    pub fn state(&self) -> Result<TestState, FatalFault> {
        self.state.get()
    }

    #[inline]
    pub fn counter(&self) -> Result<u32, FatalFault> {
        self.counter.get()
    }

    #[inline]
    pub fn is_exec(&self) -> Result<bool, FatalFault> {
        Ok(self.state.get()?.is_exec())
    }

    /// Advance `Wait*`/`Req*` of the given half.
    pub fn poll(
        &mut self,
        half: Half,
        threshold: u32,
        kind: SlotKind,
        arbiter: &mut TestArbiter,
    ) -> Result<Poll, FatalFault> {
        let (wait, req, exec) = match half {
            Half::First => (TestState::WaitFirst, TestState::ReqFirst, TestState::ExecFirst),
            Half::Cyclic => (
                TestState::WaitCyclic,
                TestState::ReqCyclic,
                TestState::ExecCyclic,
            ),
        };
        let state = self.state.get()?;
        if state == wait {
            self.counter.inc();
            if self.counter.get()? < threshold {
                return Ok(Poll::Waiting);
            }
        } else if state != req {
            return Ok(Poll::Idle);
        }

        if arbiter.try_claim(kind) {
            self.state.set(exec);
            self.counter.set(0);
            Ok(Poll::Started)
        } else {
            self.state.set(req);
            Ok(Poll::Parked)
        }
    }

    /// Current step number of an executing test; advances the counter.
    pub fn next_step(&mut self) -> Result<u32, FatalFault> {
        let step = self.counter.get()?;
        self.counter.inc();
        Ok(step)
    }

    /// Test sequence completed: go to `WaitCyclic`.
    pub fn finish(&mut self) {
        self.state.set(TestState::WaitCyclic);
        self.counter.set(0);
    }

    /// Host left its state: back to the entry state.
    pub fn reset(&mut self) -> Result<(), FatalFault> {
        self.state.set(self.entry.get()?);
        self.counter.set(0);
        Ok(())
    }

    /// Request a new first test.
    pub fn rearm_first(&mut self) {
        self.state.set(TestState::WaitFirst);
        self.counter.set(0);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_state(&mut self) {
        self.state.inject_bit_flip(false, 0);
    }
}
