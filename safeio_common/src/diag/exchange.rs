//! Inter-processor exchange image and the safety payload.
//!
//! Both are plain `Copy` structs; the wire format belongs to the transport.

use serde::{Deserialize, Serialize};

use super::state::{InputState, OutputState, Qualifier};
use crate::consts::{MAX_DI, MAX_DO};
use crate::io::pin::PinId;

#[inline]
fn bit(mask: u32, pin: PinId) -> bool {
    mask & (1u32 << pin) != 0
}

#[inline]
fn set_bit(mask: &mut u32, pin: PinId, value: bool) {
    if value {
        *mask |= 1u32 << pin;
    } else {
        *mask &= !(1u32 << pin);
    }
}

/// Values one controller commits at the end of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeImage {
    /// Scan counter of the publishing controller.
    pub sequence: u32,
    /// Committed own-channel DI values (bit per global pin).
    pub di_values: u32,
    /// Committed main qualifier per DI.
    pub di_main: [Qualifier; MAX_DI],
    /// Committed Level-Test qualifier per DI.
    pub di_level: [Qualifier; MAX_DI],
    /// Committed main qualifier per DO.
    pub do_main: [Qualifier; MAX_DO],
    pub di_state: [InputState; MAX_DI],
    pub do_state: [OutputState; MAX_DO],
    /// Inputs reported active to the protocol layer.
    pub di_reported: u32,
    /// Outputs commanded on this scan.
    pub do_commanded: u32,
}

impl Default for ExchangeImage {
    fn default() -> Self {
        Self {
            sequence: 0,
            di_values: 0,
            di_main: [Qualifier::NotAvailable; MAX_DI],
            di_level: [Qualifier::NotAvailable; MAX_DI],
            do_main: [Qualifier::NotAvailable; MAX_DO],
            di_state: [InputState::Inactive; MAX_DI],
            do_state: [OutputState::Inactive; MAX_DO],
            di_reported: 0,
            do_commanded: 0,
        }
    }
}

impl ExchangeImage {
    #[inline]
    pub fn di_value(&self, pin: PinId) -> bool {
        bit(self.di_values, pin)
    }

    #[inline]
    pub fn set_di_value(&mut self, pin: PinId, value: bool) {
        set_bit(&mut self.di_values, pin, value);
    }

    #[inline]
    pub fn reported(&self, pin: PinId) -> bool {
        bit(self.di_reported, pin)
    }

    #[inline]
    pub fn set_reported(&mut self, pin: PinId, value: bool) {
        set_bit(&mut self.di_reported, pin, value);
    }

    #[inline]
    pub fn commanded(&self, output: PinId) -> bool {
        bit(self.do_commanded, output)
    }

    #[inline]
    pub fn set_commanded(&mut self, output: PinId, value: bool) {
        set_bit(&mut self.do_commanded, output, value);
    }
}

/// Requested output levels and reset requests, polled every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyPayload {
    /// Requested output level per DO.
    pub output_request: u32,
    /// Error-reset request per DI.
    pub di_reset: u32,
    /// Error-reset request per DO.
    pub do_reset: u32,
    /// Device-wide error-reset request.
    pub global_reset: bool,
}

impl SafetyPayload {
    #[inline]
    pub fn output_requested(&self, output: PinId) -> bool {
        bit(self.output_request, output)
    }

    #[inline]
    pub fn request_output(&mut self, output: PinId, on: bool) {
        set_bit(&mut self.output_request, output, on);
    }

    #[inline]
    pub fn set_di_reset(&mut self, pin: PinId, on: bool) {
        set_bit(&mut self.di_reset, pin, on);
    }

    #[inline]
    pub fn set_do_reset(&mut self, output: PinId, on: bool) {
        set_bit(&mut self.do_reset, output, on);
    }
}
