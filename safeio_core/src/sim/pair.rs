//! Two controllers in lock-step on one simulated board.

use safeio_common::diag::exchange::{ExchangeImage, SafetyPayload};
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, OutputState};
use safeio_common::io::pin::{PinId, PinTopology, Role};
use tracing::{debug, trace};

use super::board::SimBoard;
use crate::config::DeviceSettings;
use crate::context::DiagContext;
use crate::hal::{Exchange, FailSafe};

/// Double-buffered inter-processor link.
///
/// Images published during a cycle become visible to the sibling only after
/// [`ExchangeBus::flip`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeBus {
    visible: [ExchangeImage; 2],
    pending: [ExchangeImage; 2],
}

impl ExchangeBus {
    pub fn port(&mut self, role: Role) -> BusPort<'_> {
        BusPort { bus: self, role }
    }

    pub fn flip(&mut self) {
        self.visible = self.pending;
    }

    /// Image of `role` as its sibling currently sees it.
    pub fn visible(&self, role: Role) -> &ExchangeImage {
        &self.visible[role.index()]
    }
}

/// [`Exchange`] endpoint of one controller.
pub struct BusPort<'a> {
    bus: &'a mut ExchangeBus,
    role: Role,
}

impl Exchange for BusPort<'_> {
    fn sibling(&self) -> ExchangeImage {
        self.bus.visible[self.role.sibling().index()]
    }

    fn publish(&mut self, image: &ExchangeImage) {
        self.bus.pending[self.role.index()] = *image;
    }
}

/// Controllers A and B sharing a [`SimBoard`].
///
/// Each cycle A ticks, then B, then the board latches the commands of both
/// and the exchange flips.
#[derive(Debug)]
pub struct LockstepPair {
    a: DiagContext,
    b: DiagContext,
    board: SimBoard,
    bus: ExchangeBus,
    payload: SafetyPayload,
    cycle: u64,
}

impl LockstepPair {
    pub fn new(settings: &DeviceSettings) -> Result<Self, FatalFault> {
        debug!(
            di_count = settings.topology.di_count(),
            do_count = settings.topology.do_count(),
            "lock-step pair initialized"
        );
        Ok(Self {
            a: DiagContext::new(Role::A as u8, settings)?,
            b: DiagContext::new(Role::B as u8, settings)?,
            board: SimBoard::new(settings),
            bus: ExchangeBus::default(),
            payload: SafetyPayload::default(),
            cycle: 0,
        })
    }

    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn context(&self, role: Role) -> &DiagContext {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }

    pub fn board(&self) -> &SimBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        &mut self.board
    }

    pub fn payload(&self) -> &SafetyPayload {
        &self.payload
    }

    /// Safety payload delivered to both controllers from the next cycle on.
    pub fn payload_mut(&mut self) -> &mut SafetyPayload {
        &mut self.payload
    }

    /// Run one lock-step cycle, returning the first fatal fault.
    pub fn try_step(&mut self) -> Result<(), FatalFault> {
        for role in [Role::A, Role::B] {
            let sibling = *self.bus.visible(role.sibling());
            let cx = match role {
                Role::A => &mut self.a,
                Role::B => &mut self.b,
            };
            let image = cx.tick(&mut self.board.port(role), &self.payload, &sibling)?;
            self.bus.port(role).publish(image);
        }
        self.finish_cycle();
        Ok(())
    }

    /// Run one lock-step cycle, routing fatal faults to `failsafe`.
    pub fn step<F: FailSafe>(&mut self, failsafe: &mut F) {
        for role in [Role::A, Role::B] {
            let cx = match role {
                Role::A => &mut self.a,
                Role::B => &mut self.b,
            };
            cx.run_cycle(
                &mut self.board.port(role),
                &self.payload,
                &mut self.bus.port(role),
                failsafe,
            );
        }
        self.finish_cycle();
    }

    /// Run `cycles` lock-step cycles.
    pub fn run(&mut self, cycles: u32) -> Result<(), FatalFault> {
        for _ in 0..cycles {
            self.try_step()?;
        }
        Ok(())
    }

    fn finish_cycle(&mut self) {
        self.board.latch();
        self.bus.flip();
        self.cycle += 1;
        trace!(cycle = self.cycle, "lock-step cycle done");
    }

    // ── Combined view ──

    /// Input state held by the owning controller.
    pub fn input_state(&self, pin: PinId) -> Result<InputState, FatalFault> {
        self.context(PinTopology::channel_of(pin)).input_state(pin)
    }

    pub fn output_state(&self, output: PinId) -> Result<OutputState, FatalFault> {
        self.context(PinTopology::channel_of(output)).output_state(output)
    }

    /// Input reported active by the owning controller.
    pub fn reported(&self, pin: PinId) -> bool {
        self.context(PinTopology::channel_of(pin)).reported(pin)
    }

    pub fn output_energised(&self, output: PinId) -> bool {
        self.board.output_energised(output)
    }
}
