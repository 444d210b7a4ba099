//! Short-circuit check, a byproduct of the Level-Test.
//!
//! The owner snapshots its whole channel before, during and after the test
//! pulse. Any other input that follows the pulse (active, inactive, active)
//! is wired to the pin under test.

use safeio_common::diag::fault::FatalFault;
use safeio_common::io::pin::PinId;
use tracing::{error, warn};

use crate::error::qualifier::TestVerdict;
use crate::rds::Rds;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShortCheck {
    before: Rds<u32>,
    during: Rds<u32>,
    after: Rds<u32>,
}

impl ShortCheck {
    pub fn capture_before(&mut self, values: u32) {
        self.before.set(values);
    }

    pub fn capture_during(&mut self, values: u32) {
        self.during.set(values);
    }

    pub fn capture_after(&mut self, values: u32) {
        self.after.set(values);
    }

    /// Inputs among `candidates` that followed the pulse on `pin`.
    pub fn suspects(&self, pin: PinId, candidates: u32) -> Result<u32, FatalFault> {
        let before = self.before.get()?;
        let during = self.during.get()?;
        let after = self.after.get()?;
        Ok(before & !during & after & candidates & !(1 << pin))
    }

    /// End-check: record the verdict for the pin under test.
    pub fn evaluate(
        &self,
        pin: PinId,
        candidates: u32,
        verdict: &mut TestVerdict,
    ) -> Result<(), FatalFault> {
        let suspects = self.suspects(pin, candidates)?;
        if suspects == 0 {
            return verdict.pass();
        }
        if verdict.fail()? {
            error!(pin, suspects, "short circuit confirmed");
        } else {
            warn!(pin, suspects, count = verdict.count()?, "possible short circuit");
        }
        Ok(())
    }
}
