//! Shared fixtures for the lock-step scenarios.

use safeio_common::diag::fault::FatalFault;
use safeio_common::io::config::PinFlags;
use safeio_common::io::pin::{PinId, PinTopology, Role};
use safeio_core::config::DeviceSettings;
use safeio_core::context::DiagContext;
use safeio_core::hal::FailSafe;
use safeio_core::sim::LockstepPair;

pub fn pair(settings: &DeviceSettings) -> LockstepPair {
    LockstepPair::new(settings).expect("pair init")
}

/// `di_count` inputs forming dual-channel pairs with a consistency filter.
pub fn dual_inputs(di_count: u8, do_count: u8, filter_ticks: u32) -> DeviceSettings {
    let mut settings = DeviceSettings::uniform(di_count, do_count);
    for input in settings.inputs.iter_mut() {
        input.flags |= PinFlags::DUAL_CHANNEL;
        input.consistency_ticks = filter_ticks;
    }
    settings
}

/// Turn the field devices of `pins` on.
pub fn activate(pair: &mut LockstepPair, pins: &[PinId]) {
    for &pin in pins {
        pair.board_mut().set_field(pin, true);
    }
}

/// Step until `done` holds. Returns the number of cycles taken, or `None`
/// when `max` cycles pass without it.
pub fn step_until(
    pair: &mut LockstepPair,
    max: u32,
    mut done: impl FnMut(&LockstepPair) -> bool,
) -> Option<u32> {
    for n in 1..=max {
        pair.try_step().expect("fatal fault");
        if done(pair) {
            return Some(n);
        }
    }
    None
}

/// Controller owning `pin`.
pub fn owner(pair: &LockstepPair, pin: PinId) -> &DiagContext {
    pair.context(PinTopology::channel_of(pin))
}

pub fn both_roles() -> [Role; 2] {
    [Role::A, Role::B]
}

pub struct PanicFailSafe;

impl FailSafe for PanicFailSafe {
    fn halt(&mut self, fault: FatalFault) -> ! {
        panic!("safe state: {fault}");
    }
}
