//! HS-Test engine (one schedule per DO).
//!
//! The owner switches its high-side driver off, the sibling pulls the rail
//! down through the discharge path, and after the configured offset both
//! read the shared feedback. A rail that still reads energised means the
//! driver is stuck on. Re-energising is left to the output FSM.

use heapless::Vec as HVec;
use safeio_common::consts::MAX_DO;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::TestKind;
use safeio_common::io::pin::{PinId, PinTopology};
use tracing::{debug, error, warn};

use super::scheduler::TestSchedule;
use super::StepCtx;
use crate::config::DeviceSettings;
use crate::hal::SafetyIo;
use crate::watchdog::Watched;

const STEP_START: u32 = 0;
const STEP_DISCHARGE: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct HsTest {
    schedule: TestSchedule,
    offset: u32,
}

/// Outcome of one HS-Test step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsStep {
    Idle,
    Running,
    /// Readback done; the output may re-energise after settling.
    Completed,
}

#[derive(Debug, Clone)]
pub struct HsEngine {
    tests: HVec<HsTest, MAX_DO>,
}

impl HsEngine {
    pub fn new(settings: &DeviceSettings) -> Self {
        let mut tests = HVec::new();
        for output in settings.outputs.iter() {
            let pushed = tests.push(HsTest {
                schedule: TestSchedule::with_first(),
                offset: output.hs_offset.max(1) as u32,
            });
            debug_assert!(pushed.is_ok(), "output count bounded by MAX_DO");
        }
        Self { tests }
    }

    #[inline]
    pub fn schedule(&self, output: PinId) -> Option<&TestSchedule> {
        self.tests.get(output as usize).map(|t| &t.schedule)
    }

    #[inline]
    pub fn schedule_mut(&mut self, output: PinId) -> Option<&mut TestSchedule> {
        self.tests.get_mut(output as usize).map(|t| &mut t.schedule)
    }

    pub fn in_flight(&self, output: PinId) -> Result<bool, FatalFault> {
        match self.tests.get(output as usize) {
            Some(t) => t.schedule.is_exec(),
            None => Ok(false),
        }
    }

    /// Any HS-Test executing.
    pub fn any_in_flight(&self) -> Result<bool, FatalFault> {
        for t in self.tests.iter() {
            if t.schedule.is_exec()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn exec<I: SafetyIo>(
        &mut self,
        output: PinId,
        cx: &mut StepCtx<'_, I>,
    ) -> Result<HsStep, FatalFault> {
        let Some(test) = self.tests.get_mut(output as usize) else {
            return Ok(HsStep::Idle);
        };
        if !test.schedule.is_exec()? {
            return Ok(HsStep::Idle);
        }
        let step = test.schedule.next_step()?;
        let owner = PinTopology::is_owner(cx.role, output);
        let readback = STEP_DISCHARGE + test.offset;

        match step {
            STEP_START => {
                debug!(role = %cx.role, output, "HS test start");
                if owner {
                    cx.io.set_output(output, false);
                }
            }
            STEP_DISCHARGE => {
                if !owner {
                    cx.io.set_discharge(output, true);
                }
            }
            s if s == readback => {
                if let Some(quals) = cx.quals.output(output) {
                    if cx.scan.discharged(output) {
                        quals.hs.pass()?;
                    } else if quals.hs.fail()? {
                        error!(role = %cx.role, output, "HS test error confirmed");
                    } else {
                        warn!(role = %cx.role, output, count = quals.hs.count()?, "HS test failed");
                    }
                }
                if !owner {
                    cx.io.set_discharge(output, false);
                }
                cx.watchdog.mark(Watched::Hs, output)?;
                test.schedule.finish();
                debug!(role = %cx.role, output, "HS test end");
                return Ok(HsStep::Completed);
            }
            s if s < readback => {}
            _ => {
                return Err(FatalFault::StepOutOfRange {
                    test: TestKind::HS,
                    step,
                });
            }
        }
        Ok(HsStep::Running)
    }
}
