//! Hysteresis error counters.
//!
//! A failing test bumps its counter; the qualifier only turns Error once the
//! counter reaches the limit. Two policies exist:
//!
//! - **Saturate**: +1 per failure, any pass resets to 0.
//! - **Decay**: +`up` per failure, -`down` per pass (floored at 0). Used by
//!   the output pin-state check, which tolerates sporadic mismatches.

use safeio_common::diag::fault::FatalFault;

use crate::rds::Rds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterPolicy {
    Saturate,
    Decay { up: u16, down: u16 },
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorCounter {
    count: Rds<u16>,
    limit: Rds<u16>,
    policy: CounterPolicy,
}

impl ErrorCounter {
    pub fn saturating(limit: u16) -> Self {
        Self {
            count: Rds::new(0),
            limit: Rds::new(limit.max(1)),
            policy: CounterPolicy::Saturate,
        }
    }

    pub fn decaying(limit: u16, up: u16, down: u16) -> Self {
        Self {
            count: Rds::new(0),
            limit: Rds::new(limit.max(1)),
            policy: CounterPolicy::Decay { up, down },
        }
    }

    #[inline]
    pub fn count(&self) -> Result<u16, FatalFault> {
        self.count.get()
    }

    #[inline]
    pub fn limit(&self) -> Result<u16, FatalFault> {
        self.limit.get()
    }

    /// Record a failure. Returns `true` once the limit is reached.
    pub fn fail(&mut self) -> Result<bool, FatalFault> {
        let count = self.count.get()?;
        let limit = self.limit.get()?;
        let step = match self.policy {
            CounterPolicy::Saturate => 1,
            CounterPolicy::Decay { up, .. } => up,
        };
        let headroom = limit - count.min(limit);
        self.count.add(step.min(headroom));
        Ok(self.count.get()? >= limit)
    }

    /// Record a pass.
    pub fn pass(&mut self) -> Result<(), FatalFault> {
        match self.policy {
            CounterPolicy::Saturate => self.count.set(0),
            CounterPolicy::Decay { down, .. } => {
                let count = self.count.get()?;
                self.count.sub(down.min(count));
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.count.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_errors_on_limit_th_failure() {
        let mut c = ErrorCounter::saturating(3);
        assert_eq!(c.fail(), Ok(false));
        assert_eq!(c.fail(), Ok(false));
        assert_eq!(c.fail(), Ok(true));
        // Stays at the limit.
        assert_eq!(c.fail(), Ok(true));
        assert_eq!(c.count(), Ok(3));
    }

    #[test]
    fn single_pass_resets_saturating_counter() {
        let mut c = ErrorCounter::saturating(3);
        c.fail().unwrap();
        c.fail().unwrap();
        c.pass().unwrap();
        assert_eq!(c.count(), Ok(0));
        assert_eq!(c.fail(), Ok(false));
    }

    #[test]
    fn decaying_counter_needs_sustained_mismatch() {
        let mut c = ErrorCounter::decaying(10, 2, 1);
        // Alternating fail/pass drifts upward by one per pair.
        for _ in 0..4 {
            assert_eq!(c.fail(), Ok(false));
            c.pass().unwrap();
        }
        assert_eq!(c.count(), Ok(4));
        assert_eq!(c.fail(), Ok(false));
        assert_eq!(c.fail(), Ok(false));
        assert_eq!(c.fail(), Ok(true));
        assert_eq!(c.count(), Ok(10));
    }

    #[test]
    fn corrupted_limit_is_fatal() {
        let mut c = ErrorCounter::saturating(3);
        assert_eq!(c.limit(), Ok(3));
        c.limit.inject_bit_flip(false, 4);
        assert_eq!(c.limit(), Err(FatalFault::RdsCorruption));
        assert_eq!(c.fail(), Err(FatalFault::RdsCorruption));
        assert_eq!(c.count(), Ok(0));
    }

    #[test]
    fn decay_floors_at_zero() {
        let mut c = ErrorCounter::decaying(10, 2, 5);
        c.fail().unwrap();
        c.pass().unwrap();
        assert_eq!(c.count(), Ok(0));
    }
}
