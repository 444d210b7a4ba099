//! Level-Test engine (one schedule per DI).
//!
//! The sibling controller pulses the test line of an active input; the owner
//! must see the input drop. Ownership alternates with controller identity XOR
//! pin parity, so the pulse always crosses to the other controller.
//!
//! Steps:
//! 0. set-pulse: sender asserts the pulse, owner snapshots its channel.
//! 1. readback: sender releases, owner re-samples and evaluates the pin.
//! 2. end: owner runs the short-circuit end-check.

use heapless::Vec as HVec;
use safeio_common::consts::MAX_DI;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::TestKind;
use safeio_common::io::pin::{PinId, PinTopology};
use tracing::{debug, error, warn};

use super::scheduler::TestSchedule;
use super::short::ShortCheck;
use super::StepCtx;
use crate::hal::SafetyIo;
use crate::watchdog::Watched;

const STEP_SET_PULSE: u32 = 0;
const STEP_READBACK: u32 = 1;
const STEP_END: u32 = 2;

/// Outcome of one Level-Test step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStep {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
pub struct LevelEngine {
    schedules: HVec<TestSchedule, MAX_DI>,
}

impl LevelEngine {
    pub fn new(di_count: u8) -> Self {
        let mut schedules = HVec::new();
        for _ in 0..di_count.min(MAX_DI as u8) {
            let pushed = schedules.push(TestSchedule::with_first());
            debug_assert!(pushed.is_ok());
        }
        Self { schedules }
    }

    #[inline]
    pub fn schedule(&self, pin: PinId) -> Option<&TestSchedule> {
        self.schedules.get(pin as usize)
    }

    #[inline]
    pub fn schedule_mut(&mut self, pin: PinId) -> Option<&mut TestSchedule> {
        self.schedules.get_mut(pin as usize)
    }

    /// Level-Test currently executing on this pin.
    pub fn in_flight(&self, pin: PinId) -> Result<bool, FatalFault> {
        match self.schedules.get(pin as usize) {
            Some(s) => s.is_exec(),
            None => Ok(false),
        }
    }

    /// Run one step of the test executing on `pin`.
    ///
    /// `channel_mask` selects the enabled inputs of the owner's channel for
    /// the short-circuit snapshots.
    pub fn exec<I: SafetyIo>(
        &mut self,
        pin: PinId,
        channel_mask: u32,
        short: &mut ShortCheck,
        cx: &mut StepCtx<'_, I>,
    ) -> Result<LevelStep, FatalFault> {
        let Some(schedule) = self.schedules.get_mut(pin as usize) else {
            return Ok(LevelStep::Idle);
        };
        if !schedule.is_exec()? {
            return Ok(LevelStep::Idle);
        }
        let first = schedule.state()?.is_first();
        let step = schedule.next_step()?;
        let owner = PinTopology::is_owner(cx.role, pin);

        match step {
            STEP_SET_PULSE => {
                debug!(role = %cx.role, pin, first, "level test start");
                if owner {
                    short.capture_before(cx.scan.di & channel_mask);
                } else {
                    cx.io.set_test_pulse(pin, true);
                }
                Ok(LevelStep::Running)
            }
            STEP_READBACK => {
                if owner {
                    short.capture_during(cx.scan.di & channel_mask);
                    let Some(quals) = cx.quals.input(pin) else {
                        return Ok(LevelStep::Running);
                    };
                    if !cx.scan.di(pin) {
                        quals.level.pass()?;
                    } else if quals.level.fail()? {
                        error!(role = %cx.role, pin, "level test error confirmed");
                    } else {
                        warn!(
                            role = %cx.role,
                            pin,
                            count = quals.level.count()?,
                            "level test failed"
                        );
                    }
                } else {
                    cx.io.set_test_pulse(pin, false);
                }
                cx.watchdog.mark(Watched::Level, pin)?;
                Ok(LevelStep::Running)
            }
            STEP_END => {
                if owner {
                    short.capture_after(cx.scan.di & channel_mask);
                    if let Some(quals) = cx.quals.input(pin) {
                        short.evaluate(pin, channel_mask, &mut quals.short)?;
                    }
                }
                schedule.finish();
                debug!(role = %cx.role, pin, "level test end");
                Ok(LevelStep::Finished)
            }
            _ => Err(FatalFault::StepOutOfRange {
                test: TestKind::LEVEL,
                step,
            }),
        }
    }
}
