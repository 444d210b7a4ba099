//! Diagnostic timeout watchdog.
//!
//! Engines set an "executed" bit whenever they complete an evaluation step.
//! Every tick the context narrows an "eligible" mask to the instances whose
//! hosting condition held for the whole period so far. At the end of each
//! period, any instance that stayed eligible but never executed is a fatal
//! fault; then both masks start over.
//!
//! The same period check enforces the HS-Test bound on continuously active
//! outputs.

use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::TestKind;
use tracing::{debug, error};

use crate::rds::Rds;

/// Watched test families. Each keeps one bit per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Watched {
    /// Per DI.
    Level = 0,
    /// Per controller channel.
    To = 1,
    /// Per DI pair.
    Consistency = 2,
    /// Per DO.
    Hs = 3,
    /// Single instance, bit 0.
    Vsup = 4,
}

impl Watched {
    pub const ALL: [Self; 5] = [Self::Level, Self::To, Self::Consistency, Self::Hs, Self::Vsup];

    pub const fn test_kind(self) -> TestKind {
        match self {
            Self::Level => TestKind::LEVEL,
            Self::To => TestKind::TO,
            Self::Consistency => TestKind::CONSISTENCY,
            Self::Hs => TestKind::HS,
            Self::Vsup => TestKind::VSUP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    period: u32,
    hs_timeout: u32,
    elapsed: Rds<u32>,
    executed: [Rds<u32>; 5],
    eligible: [Rds<u32>; 5],
}

impl Watchdog {
    pub fn new(period: u32, hs_timeout: u32) -> Self {
        Self {
            period: period.max(1),
            hs_timeout,
            elapsed: Rds::new(0),
            executed: [Rds::new(0); 5],
            eligible: [Rds::new(u32::MAX); 5],
        }
    }

    #[inline]
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Record a completed evaluation step.
    pub fn mark(&mut self, kind: Watched, index: u8) -> Result<(), FatalFault> {
        let cell = &mut self.executed[kind as usize];
        let bits = cell.get()?;
        cell.set(bits | (1 << index));
        Ok(())
    }

    /// Narrow the eligible set to the instances hosted this tick.
    pub fn observe(&mut self, kind: Watched, hosted: u32) -> Result<(), FatalFault> {
        let cell = &mut self.eligible[kind as usize];
        let bits = cell.get()?;
        cell.set(bits & hosted);
        Ok(())
    }

    #[inline]
    pub fn executed(&self, kind: Watched) -> Result<u32, FatalFault> {
        self.executed[kind as usize].get()
    }

    /// Advance one tick. Returns `true` when a period ended and all
    /// required tests had executed.
    pub fn tick(&mut self) -> Result<bool, FatalFault> {
        self.elapsed.inc();
        if self.elapsed.get()? < self.period {
            return Ok(false);
        }

        for kind in Watched::ALL {
            let missing = self.eligible[kind as usize].get()? & !self.executed[kind as usize].get()?;
            if missing != 0 {
                let index = missing.trailing_zeros() as u8;
                error!(test = %kind.test_kind(), index, "diagnostic timeout");
                return Err(FatalFault::DiagnosticTimeout {
                    test: kind.test_kind(),
                    index,
                });
            }
        }

        debug!(period = self.period, "watchdog period complete");
        self.elapsed.set(0);
        for kind in Watched::ALL {
            self.executed[kind as usize].set(0);
            self.eligible[kind as usize].set(u32::MAX);
        }
        Ok(true)
    }

    /// HS-Test bound for an output that has been on for `cycles` ticks.
    pub fn check_hs_overdue(&self, output: u8, cycles: u32) -> Result<(), FatalFault> {
        if cycles > self.hs_timeout {
            error!(output, cycles, "HS-Test overdue");
            return Err(FatalFault::HsTestOverdue { output, cycles });
        }
        Ok(())
    }
}
