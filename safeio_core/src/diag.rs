//! Diagnostic test engines.
//!
//! Both controllers run every schedule in lock-step; the [`Role`] decides per
//! step whether this instance pulses, discharges or evaluates. Engines take
//! a [`StepCtx`] holding everything a step may touch.
//!
//! | Engine | Unit | Steps |
//! |---|---|---|
//! | Level | DI | 0 set-pulse, 1 readback, 2 end |
//! | Short | channel | byproduct of Level |
//! | TO | channel | 0 start, D reset-pulse, D+2 stop |
//! | Consistency | DI pair | every quiet tick |
//! | HS | DO | 0 start, 1 discharge, 1+R readback |
//! | VSUP | device | 0 test, 1 discharge, 2 eval, 3 release, 4 life, 6 end |

use safeio_common::consts::{MAX_DI, MAX_DO};
use safeio_common::io::pin::{PinId, PinTopology, Role};

use crate::error::qualifier::Aggregator;
use crate::hal::SafetyIo;
use crate::watchdog::Watchdog;

pub mod consistency;
pub mod hs;
pub mod level;
pub mod scheduler;
pub mod short;
pub mod vsup;

/// Pin values sampled at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scan {
    /// Own-channel DI values (bit per global pin).
    pub di: u32,
    /// DO feedback, bit set when the rail reads discharged.
    pub discharged: u32,
}

impl Scan {
    /// Sample own-channel inputs and all output feedback pins.
    pub fn sample<I: SafetyIo>(io: &I, role: Role, topology: &PinTopology) -> Self {
        let mut scan = Self::default();
        for pin in topology.channel_inputs(role) {
            if io.read_input(pin) {
                scan.di |= 1 << pin;
            }
        }
        for output in 0..topology.do_count() {
            if io.read_feedback(output) {
                scan.discharged |= 1 << output;
            }
        }
        scan
    }

    #[inline]
    pub fn di(&self, pin: PinId) -> bool {
        self.di & (1 << pin) != 0
    }

    #[inline]
    pub fn discharged(&self, output: PinId) -> bool {
        self.discharged & (1 << output) != 0
    }
}

/// Borrowed state an engine step may read or drive.
pub struct StepCtx<'a, I: SafetyIo> {
    pub role: Role,
    pub topology: &'a PinTopology,
    pub io: &'a mut I,
    pub scan: &'a Scan,
    pub quals: &'a mut Aggregator,
    pub watchdog: &'a mut Watchdog,
}

/// Bit mask covering the first `count` pins.
#[inline]
pub(crate) const fn pin_mask(count: u8) -> u32 {
    if count as usize >= 32 { u32::MAX } else { (1u32 << count) - 1 }
}

static_assertions::const_assert!(MAX_DI <= 32 && MAX_DO <= 32);
