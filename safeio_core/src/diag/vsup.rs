//! VSUP-Test engine (single instance per device).
//!
//! Verifies the shared supply cutoff: one controller asserts its cutoff test
//! condition, both discharge the outputs they do not own, and every output
//! must then read discharged. Runs alternate between two phases:
//!
//! | phase | controller A (C1)     | controller B (C2)           |
//! |-------|-----------------------|-----------------------------|
//! | Step1 | asserts the condition | discharges, life signal     |
//! | Step2 | discharges            | asserts, discharges, life   |
//!
//! Each (phase, controller) pair has its own sub-sequence of step actions.
//! Both controllers evaluate in the same step so their verdicts agree.

use bitflags::bitflags;
use safeio_common::consts::VSUP_LIFE_SETTLE_TICKS;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::TestKind;
use safeio_common::io::pin::{PinTopology, Role};
use tracing::{debug, error, warn};

use super::scheduler::TestSchedule;
use super::StepCtx;
use crate::hal::SafetyIo;
use crate::rds::Rds;
use crate::watchdog::Watched;

const STEP_TEST: u32 = 0;
const STEP_DISCHARGE: u32 = 1;
const STEP_EVALUATE: u32 = 2;
const STEP_RELEASE: u32 = 3;
const STEP_LIFE: u32 = 4;
const STEP_END: u32 = STEP_LIFE + VSUP_LIFE_SETTLE_TICKS as u32;
const RUN_LEN: usize = STEP_END as usize + 1;

bitflags! {
    /// What a controller does in one step of its sub-sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VsupAction: u8 {
        const ASSERT_TEST       = 0x01;
        const DISCHARGE         = 0x02;
        const EVALUATE          = 0x04;
        const RELEASE_TEST      = 0x08;
        const RELEASE_DISCHARGE = 0x10;
        const TOGGLE_LIFE       = 0x20;
        const END               = 0x40;
    }
}

type SubSequence = [VsupAction; RUN_LEN];

const fn sub_sequence(asserts: bool, life: bool) -> SubSequence {
    let mut seq = [VsupAction::empty(); RUN_LEN];
    if asserts {
        seq[STEP_TEST as usize] = VsupAction::ASSERT_TEST;
        seq[STEP_RELEASE as usize] = VsupAction::RELEASE_TEST.union(VsupAction::RELEASE_DISCHARGE);
    } else {
        seq[STEP_RELEASE as usize] = VsupAction::RELEASE_DISCHARGE;
    }
    seq[STEP_DISCHARGE as usize] = VsupAction::DISCHARGE;
    seq[STEP_EVALUATE as usize] = VsupAction::EVALUATE;
    if life {
        seq[STEP_LIFE as usize] = VsupAction::TOGGLE_LIFE;
    }
    seq[STEP_END as usize] = VsupAction::END;
    seq
}

const STEP1_C1: SubSequence = sub_sequence(true, false);
const STEP1_C2: SubSequence = sub_sequence(false, true);
const STEP2_C1: SubSequence = sub_sequence(false, false);
const STEP2_C2: SubSequence = sub_sequence(true, true);

/// Which controller asserts the cutoff condition in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsupPhase {
    /// Controller A asserts.
    Step1,
    /// Controller B asserts.
    Step2,
}

impl VsupPhase {
    #[inline]
    pub fn tester(self) -> Role {
        match self {
            VsupPhase::Step1 => Role::A,
            VsupPhase::Step2 => Role::B,
        }
    }

    fn sequence(self, role: Role) -> &'static SubSequence {
        match (self, role) {
            (VsupPhase::Step1, Role::A) => &STEP1_C1,
            (VsupPhase::Step1, Role::B) => &STEP1_C2,
            (VsupPhase::Step2, Role::A) => &STEP2_C1,
            (VsupPhase::Step2, Role::B) => &STEP2_C2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VsupEngine {
    schedule: TestSchedule,
    /// `false`: Step1, `true`: Step2.
    phase: Rds<bool>,
}

impl Default for VsupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VsupEngine {
    pub fn new() -> Self {
        Self {
            schedule: TestSchedule::cyclic_only(),
            phase: Rds::new(false),
        }
    }

    #[inline]
    pub fn schedule(&self) -> &TestSchedule {
        &self.schedule
    }

    #[inline]
    pub fn schedule_mut(&mut self) -> &mut TestSchedule {
        &mut self.schedule
    }

    #[inline]
    pub fn in_flight(&self) -> Result<bool, FatalFault> {
        self.schedule.is_exec()
    }

    pub fn phase(&self) -> Result<VsupPhase, FatalFault> {
        Ok(if self.phase.get()? {
            VsupPhase::Step2
        } else {
            VsupPhase::Step1
        })
    }

    /// Controller asserting the cutoff test condition in the current run.
    pub fn tester(&self) -> Result<Role, FatalFault> {
        Ok(self.phase()?.tester())
    }

    /// Run one step. `active` has a bit per output whose FSM is Active.
    pub fn exec<I: SafetyIo>(
        &mut self,
        active: u32,
        cx: &mut StepCtx<'_, I>,
    ) -> Result<(), FatalFault> {
        if !self.schedule.is_exec()? {
            return Ok(());
        }
        let step = self.schedule.next_step()?;
        let phase = self.phase()?;
        let Some(&actions) = phase.sequence(cx.role).get(step as usize) else {
            return Err(FatalFault::StepOutOfRange {
                test: TestKind::VSUP,
                step,
            });
        };

        if step == STEP_TEST {
            debug!(role = %cx.role, ?phase, "VSUP test start");
        }
        if actions.contains(VsupAction::ASSERT_TEST) {
            cx.io.set_vsup_test(true);
        }
        if actions.contains(VsupAction::DISCHARGE) {
            discharge_foreign(cx, true);
        }
        if actions.contains(VsupAction::EVALUATE) {
            if active != 0 {
                evaluate(cx)?;
            }
            cx.watchdog.mark(Watched::Vsup, 0)?;
        }
        if actions.contains(VsupAction::RELEASE_TEST) {
            cx.io.set_vsup_test(false);
        }
        if actions.contains(VsupAction::RELEASE_DISCHARGE) {
            discharge_foreign(cx, false);
        }
        if actions.contains(VsupAction::TOGGLE_LIFE) {
            cx.io.toggle_life_signal();
        }
        if actions.contains(VsupAction::END) {
            self.phase.set(phase == VsupPhase::Step1);
            self.schedule.finish();
            debug!(role = %cx.role, ?phase, "VSUP test end");
        }
        Ok(())
    }
}

/// Drive the discharge circuits of the outputs owned by the sibling.
fn discharge_foreign<I: SafetyIo>(cx: &mut StepCtx<'_, I>, on: bool) {
    for output in 0..cx.topology.do_count() {
        if !PinTopology::is_owner(cx.role, output) {
            cx.io.set_discharge(output, on);
        }
    }
}

fn evaluate<I: SafetyIo>(cx: &mut StepCtx<'_, I>) -> Result<(), FatalFault> {
    let energised = (0..cx.topology.do_count()).find(|&o| !cx.scan.discharged(o));
    match energised {
        None => cx.quals.vsup.pass(),
        Some(output) => {
            if cx.quals.vsup.fail()? {
                error!(role = %cx.role, output, "VSUP cutoff error confirmed");
            } else {
                warn!(
                    role = %cx.role,
                    output,
                    count = cx.quals.vsup.count()?,
                    "VSUP cutoff test failed"
                );
            }
            Ok(())
        }
    }
}
