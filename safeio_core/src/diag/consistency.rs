//! Consistency check of dual-channel input pairs.
//!
//! Compares the committed values of both pair members every quiet tick. A
//! mismatch is ambiguous while it lasts less than the filter time; once it
//! has lasted the full filter time both members are marked Error.

use heapless::Vec as HVec;
use safeio_common::consts::MAX_DI_PAIRS;
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::Qualifier;
use safeio_common::io::pin::PairId;
use tracing::{error, warn};

use crate::config::DeviceSettings;
use crate::error::qualifier::Aggregator;
use crate::rds::Rds;
use crate::watchdog::{Watchdog, Watched};

#[derive(Debug, Clone, Copy)]
struct PairFilter {
    mismatch: Rds<u32>,
    /// Filter time in ticks; 0 when the pair is not checked.
    filter: Rds<u32>,
}

#[derive(Debug, Clone)]
pub struct ConsistencyCheck {
    pairs: HVec<PairFilter, MAX_DI_PAIRS>,
}

impl ConsistencyCheck {
    pub fn new(settings: &DeviceSettings) -> Self {
        let mut pairs = HVec::new();
        for pair in 0..settings.topology.di_pair_count() {
            let even = settings.input(pair * 2);
            let odd = settings.input(pair * 2 + 1);
            let filter = match (even, odd) {
                (Some(a), Some(b)) if a.enabled() && a.dual() && b.dual() => a.consistency_ticks,
                _ => 0,
            };
            let pushed = pairs.push(PairFilter {
                mismatch: Rds::new(0),
                filter: Rds::new(filter),
            });
            debug_assert!(pushed.is_ok(), "pair count bounded by MAX_DI_PAIRS");
        }
        Self { pairs }
    }

    /// Pair has a dual-channel configuration with a non-zero filter.
    #[inline]
    pub fn configured(&self, pair: PairId) -> Result<bool, FatalFault> {
        match self.pairs.get(pair as usize) {
            Some(p) => Ok(p.filter.get()? > 0),
            None => Ok(false),
        }
    }

    /// Bit per configured pair.
    pub fn configured_mask(&self) -> Result<u32, FatalFault> {
        let mut mask = 0;
        for (idx, p) in self.pairs.iter().enumerate() {
            if p.filter.get()? > 0 {
                mask |= 1 << idx;
            }
        }
        Ok(mask)
    }

    pub fn mismatch_count(&self, pair: PairId) -> Result<u32, FatalFault> {
        match self.pairs.get(pair as usize) {
            Some(p) => p.mismatch.get(),
            None => Ok(0),
        }
    }

    /// Forget the mismatch history of a pair.
    pub fn clear(&mut self, pair: PairId) {
        if let Some(p) = self.pairs.get_mut(pair as usize) {
            p.mismatch.set(0);
        }
    }

    /// Compare both members' values and update their qualifiers.
    pub fn check(
        &mut self,
        pair: PairId,
        even: bool,
        odd: bool,
        quals: &mut Aggregator,
        watchdog: &mut Watchdog,
    ) -> Result<(), FatalFault> {
        let Some(p) = self.pairs.get_mut(pair as usize) else {
            return Ok(());
        };
        let filter = p.filter.get()?;
        if filter == 0 {
            return Ok(());
        }

        let verdict = if even == odd {
            p.mismatch.set(0);
            Qualifier::Ok
        } else {
            p.mismatch.inc();
            let count = p.mismatch.get()?;
            if count >= filter {
                // Hold at the filter time so the counter cannot wrap.
                p.mismatch.set(filter);
                if count == filter {
                    error!(pair, filter, "channel inconsistency confirmed");
                }
                Qualifier::Error
            } else {
                warn!(pair, count, filter, even, odd, "channel mismatch");
                Qualifier::NotAvailable
            }
        };

        for pin in [pair * 2, pair * 2 + 1] {
            if let Some(input) = quals.input(pin) {
                input.consistency.set(verdict);
            }
        }
        watchdog.mark(Watched::Consistency, pair)
    }
}
