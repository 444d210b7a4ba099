//! Per-pin qualifiers and the scan aggregator.
//!
//! Each diagnostic writes its own [`QualifierSlot`]. At the end of a scan the
//! [`Aggregator`] folds the slots of every pin into a temporary main
//! qualifier and then commits all of them at once, so the exchange image
//! never carries a half-updated scan.

use heapless::Vec as HVec;
use safeio_common::consts::{MAX_DI, MAX_DO};
use safeio_common::diag::config::ErrorLimits;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::Qualifier;
use safeio_common::io::pin::PinId;

use super::counter::ErrorCounter;
use crate::rds::Rds;

/// One diagnostic's verdict for one pin.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualifierSlot {
    value: Rds<Qualifier>,
}

impl QualifierSlot {
    #[inline]
    pub fn get(&self) -> Result<Qualifier, FatalFault> {
        self.value.get()
    }

    /// Overwrite unconditionally.
    #[inline]
    pub fn set(&mut self, q: Qualifier) {
        self.value.set(q);
    }

    /// Mark Ok unless already latched in Error.
    pub fn set_ok(&mut self) -> Result<(), FatalFault> {
        if self.value.get()? != Qualifier::Error {
            self.value.set(Qualifier::Ok);
        }
        Ok(())
    }

    pub fn set_error(&mut self) {
        self.value.set(Qualifier::Error);
    }

    pub fn clear(&mut self) {
        self.value.set(Qualifier::NotAvailable);
    }
}

/// Counter plus latching slot for a hysteresis-confirmed test.
#[derive(Debug, Clone, Copy)]
pub struct TestVerdict {
    counter: ErrorCounter,
    slot: QualifierSlot,
}

impl TestVerdict {
    pub fn new(counter: ErrorCounter) -> Self {
        Self {
            counter,
            slot: QualifierSlot::default(),
        }
    }

    #[inline]
    pub fn qualifier(&self) -> Result<Qualifier, FatalFault> {
        self.slot.get()
    }

    #[inline]
    pub fn count(&self) -> Result<u16, FatalFault> {
        self.counter.count()
    }

    pub fn pass(&mut self) -> Result<(), FatalFault> {
        self.counter.pass()?;
        self.slot.set_ok()
    }

    /// Returns `true` when this failure confirmed the Error.
    pub fn fail(&mut self) -> Result<bool, FatalFault> {
        let confirmed = self.counter.fail()?;
        if confirmed && self.slot.get()? != Qualifier::Error {
            self.slot.set_error();
            return Ok(true);
        }
        Ok(false)
    }

    pub fn clear(&mut self) {
        self.counter.clear();
        self.slot.clear();
    }
}

/// Temp/commit pair of a pin's main qualifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainQualifier {
    temp: Rds<Qualifier>,
    committed: Rds<Qualifier>,
}

impl MainQualifier {
    #[inline]
    pub fn stage(&mut self, q: Qualifier) {
        self.temp.set(q);
    }

    pub fn commit(&mut self) -> Result<(), FatalFault> {
        self.committed.set(self.temp.get()?);
        Ok(())
    }

    #[inline]
    pub fn committed(&self) -> Result<Qualifier, FatalFault> {
        self.committed.get()
    }

    pub fn clear(&mut self) {
        self.temp.set(Qualifier::NotAvailable);
        self.committed.set(Qualifier::NotAvailable);
    }
}

/// Slots of one DI.
#[derive(Debug, Clone, Copy)]
pub struct InputQualifiers {
    pub level: TestVerdict,
    pub short: TestVerdict,
    pub to: TestVerdict,
    /// Set directly by the pair check; no latch, no own counter.
    pub consistency: QualifierSlot,
    pub main: MainQualifier,
}

impl InputQualifiers {
    pub fn new(limits: &ErrorLimits) -> Self {
        Self {
            level: TestVerdict::new(ErrorCounter::saturating(limits.level)),
            short: TestVerdict::new(ErrorCounter::saturating(limits.short)),
            to: TestVerdict::new(ErrorCounter::saturating(limits.to)),
            consistency: QualifierSlot::default(),
            main: MainQualifier::default(),
        }
    }

    /// Fold of all slots as they stand now.
    pub fn live(&self) -> Result<Qualifier, FatalFault> {
        Ok(self
            .level
            .qualifier()?
            .combine(self.short.qualifier()?)
            .combine(self.to.qualifier()?)
            .combine(self.consistency.get()?))
    }

    /// Forget test history after the input dropped out of its active states.
    pub fn clear_tests(&mut self) {
        self.level.clear();
        self.short.clear();
        self.to.clear();
    }

    /// Full clear on an accepted error reset.
    pub fn clear_all(&mut self) {
        self.clear_tests();
        self.consistency.clear();
        self.main.clear();
    }
}

/// Slots of one DO. The VSUP verdict is device-wide and lives in the
/// aggregator.
#[derive(Debug, Clone, Copy)]
pub struct OutputQualifiers {
    pub hs: TestVerdict,
    pub pin_check: TestVerdict,
    pub main: MainQualifier,
}

impl OutputQualifiers {
    pub fn new(limits: &ErrorLimits) -> Self {
        Self {
            hs: TestVerdict::new(ErrorCounter::saturating(limits.hs)),
            pin_check: TestVerdict::new(ErrorCounter::decaying(
                limits.pin_check,
                limits.pin_check_step_up,
                limits.pin_check_step_down,
            )),
            main: MainQualifier::default(),
        }
    }

    pub fn clear_all(&mut self) {
        self.hs.clear();
        self.pin_check.clear();
        self.main.clear();
    }
}

/// All qualifiers of one controller.
#[derive(Debug, Clone)]
pub struct Aggregator {
    pub inputs: HVec<InputQualifiers, MAX_DI>,
    pub outputs: HVec<OutputQualifiers, MAX_DO>,
    pub vsup: TestVerdict,
}

impl Aggregator {
    pub fn new(di_count: u8, do_count: u8, limits: &ErrorLimits) -> Self {
        let mut inputs = HVec::new();
        for _ in 0..di_count.min(MAX_DI as u8) {
            let pushed = inputs.push(InputQualifiers::new(limits));
            debug_assert!(pushed.is_ok());
        }
        let mut outputs = HVec::new();
        for _ in 0..do_count.min(MAX_DO as u8) {
            let pushed = outputs.push(OutputQualifiers::new(limits));
            debug_assert!(pushed.is_ok());
        }
        Self {
            inputs,
            outputs,
            vsup: TestVerdict::new(ErrorCounter::saturating(limits.vsup)),
        }
    }

    #[inline]
    pub fn input(&mut self, pin: PinId) -> Option<&mut InputQualifiers> {
        self.inputs.get_mut(pin as usize)
    }

    #[inline]
    pub fn output(&mut self, pin: PinId) -> Option<&mut OutputQualifiers> {
        self.outputs.get_mut(pin as usize)
    }

    /// Live fold of a DO's slots including the shared VSUP verdict.
    pub fn output_live(&self, pin: PinId) -> Result<Qualifier, FatalFault> {
        let vsup = self.vsup.qualifier()?;
        match self.outputs.get(pin as usize) {
            Some(o) => Ok(o
                .hs
                .qualifier()?
                .combine(o.pin_check.qualifier()?)
                .combine(vsup)),
            None => Ok(Qualifier::NotAvailable),
        }
    }

    /// Stage every pin's main qualifier from its slots.
    pub fn aggregate(&mut self) -> Result<(), FatalFault> {
        for input in self.inputs.iter_mut() {
            let q = input.live()?;
            input.main.stage(q);
        }
        for pin in 0..self.outputs.len() {
            let q = self.output_live(pin as PinId)?;
            self.outputs[pin].main.stage(q);
        }
        Ok(())
    }

    /// Publish all staged qualifiers.
    pub fn commit(&mut self) -> Result<(), FatalFault> {
        for input in self.inputs.iter_mut() {
            input.main.commit()?;
        }
        for output in self.outputs.iter_mut() {
            output.main.commit()?;
        }
        Ok(())
    }
}
