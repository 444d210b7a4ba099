//! Collaborator interfaces of the diagnostic engine.
//!
//! The engine never touches hardware or transport directly. Every tick it
//! reads debounced pin values and issues drive commands through [`SafetyIo`],
//! trades committed state with the sibling controller through [`Exchange`],
//! and hands any integrity violation to [`FailSafe`].

use safeio_common::diag::exchange::ExchangeImage;
use safeio_common::diag::fault::FatalFault;
use safeio_common::io::pin::{PinId, Role};

/// GPIO and first-stage filter of one controller.
///
/// Drive commands are atomic and take effect with zero latency from the
/// engine's point of view; the board decides when they become physical.
pub trait SafetyIo {
    /// Debounced value of a DI on this controller's channel.
    fn read_input(&self, pin: PinId) -> bool;

    /// Shared feedback of a DO. `true` when the output rail reads discharged.
    fn read_feedback(&self, output: PinId) -> bool;

    /// High-side driver of an owned DO.
    fn set_output(&mut self, output: PinId, on: bool);

    /// Discharge path of a sibling-owned DO.
    fn set_discharge(&mut self, output: PinId, on: bool);

    /// Level-Test pulse forcing a sibling-owned DI inactive.
    fn set_test_pulse(&mut self, input: PinId, on: bool);

    /// Level of the TO line feeding the contacts of `channel`.
    fn set_to_level(&mut self, channel: Role, high: bool);

    /// Driver enable of the TO line feeding the contacts of `channel`.
    fn set_to_enable(&mut self, channel: Role, enable: bool);

    /// This controller's VSUP cutoff test condition.
    fn set_vsup_test(&mut self, on: bool);

    /// Toggle the supply supervisor life signal.
    fn toggle_life_signal(&mut self);
}

/// Non-returning safe-state handler.
pub trait FailSafe {
    fn halt(&mut self, fault: FatalFault) -> !;
}

/// Inter-processor exchange of committed scan results.
pub trait Exchange {
    /// Image the sibling committed at the end of its previous scan.
    fn sibling(&self) -> ExchangeImage;

    /// Publish this controller's image for the sibling's next scan.
    fn publish(&mut self, image: &ExchangeImage);
}
