//! Error-reset edge detection.
//!
//! Only a 0→1 transition of a request bit since the previous tick counts.
//! The device-wide request applies to a pin only while the pin's own
//! request bit reads 0, so a held per-pin request cannot re-trigger it.

use safeio_common::diag::exchange::SafetyPayload;
use safeio_common::diag::fault::FatalFault;
use safeio_common::io::pin::PinId;

use crate::rds::Rds;

/// Accepted reset edges of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetEdges {
    di: u32,
    do_: u32,
}

impl ResetEdges {
    #[inline]
    pub fn input(&self, pin: PinId) -> bool {
        self.di & (1 << pin) != 0
    }

    #[inline]
    pub fn output(&self, pin: PinId) -> bool {
        self.do_ & (1 << pin) != 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResetDetector {
    prev_di: Rds<u32>,
    prev_do: Rds<u32>,
    prev_global: Rds<bool>,
}

impl Default for ResetDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetDetector {
    pub fn new() -> Self {
        Self {
            prev_di: Rds::new(0),
            prev_do: Rds::new(0),
            prev_global: Rds::new(false),
        }
    }

    /// Edges present in `payload` relative to the previous tick.
    pub fn detect(&mut self, payload: &SafetyPayload) -> Result<ResetEdges, FatalFault> {
        let global_edge = payload.global_reset && !self.prev_global.get()?;
        let di_edge = payload.di_reset & !self.prev_di.get()?;
        let do_edge = payload.do_reset & !self.prev_do.get()?;

        self.prev_di.set(payload.di_reset);
        self.prev_do.set(payload.do_reset);
        self.prev_global.set(payload.global_reset);

        let (di_global, do_global) = if global_edge {
            (!payload.di_reset, !payload.do_reset)
        } else {
            (0, 0)
        };
        Ok(ResetEdges {
            di: di_edge | di_global,
            do_: do_edge | do_global,
        })
    }
}
