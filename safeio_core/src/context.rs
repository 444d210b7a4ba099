//! Per-device diagnostic context.
//!
//! Owns every piece of engine state for one controller and runs the tick:
//!
//! 1. sample own-channel inputs and output feedback
//! 2. build the process image from both controllers' previous commits
//! 3. detect reset edges
//! 4. input FSMs
//! 5. output FSMs
//! 6. test engines: execute running steps, then first-test and cyclic polls
//! 7. consistency check, output pin-state check, output error sweep
//! 8. drive outputs and TO lines
//! 9. commit values and qualifiers, publish the exchange image
//! 10. watchdog

use heapless::Vec as HVec;
use safeio_common::consts::{MAX_DI, MAX_DO};
use safeio_common::diag::exchange::{ExchangeImage, SafetyPayload};
use safeio_common::diag::fault::FatalFault;
use safeio_common::diag::state::{InputState, OutputState, Qualifier};
use safeio_common::io::pin::{PinId, PinTopology, Role};
use tracing::{error, warn};

use crate::config::DeviceSettings;
use crate::diag::consistency::ConsistencyCheck;
use crate::diag::hs::{HsEngine, HsStep};
use crate::diag::level::LevelEngine;
use crate::diag::scheduler::{Half, Poll, SlotKind, Slots, TestArbiter};
use crate::diag::short::ShortCheck;
use crate::diag::to_test::ToEngine;
use crate::diag::vsup::VsupEngine;
use crate::diag::{Scan, StepCtx};
use crate::error::qualifier::Aggregator;
use crate::hal::{Exchange, FailSafe, SafetyIo};
use crate::rds::Rds;
use crate::state::input::{self, InputAction, InputFsm, InputView};
use crate::state::output::{OutputAction, OutputFsm, OutputView};
use crate::state::reset::ResetDetector;
use crate::watchdog::{Watchdog, Watched};

// ─── Process Image ──────────────────────────────────────────────────

/// Both controllers' previous commits, merged.
#[derive(Debug, Clone, Copy)]
struct ProcessImage {
    values: u32,
    di_main: [Qualifier; MAX_DI],
    di_level: [Qualifier; MAX_DI],
    do_main: [Qualifier; MAX_DO],
}

impl ProcessImage {
    fn merge(role: Role, own: &ExchangeImage, sibling: &ExchangeImage) -> Self {
        let own_channel = channel_mask(role);
        let mut image = Self {
            values: (own.di_values & own_channel) | (sibling.di_values & !own_channel),
            di_main: [Qualifier::NotAvailable; MAX_DI],
            di_level: [Qualifier::NotAvailable; MAX_DI],
            do_main: [Qualifier::NotAvailable; MAX_DO],
        };
        for pin in 0..MAX_DI {
            image.di_main[pin] = own.di_main[pin].combine(sibling.di_main[pin]);
            image.di_level[pin] = own.di_level[pin].combine(sibling.di_level[pin]);
        }
        for output in 0..MAX_DO {
            image.do_main[output] = own.do_main[output].combine(sibling.do_main[output]);
        }
        image
    }

    #[inline]
    fn value(&self, pin: PinId) -> bool {
        self.values & (1 << pin) != 0
    }
}

/// Bit mask of every pin index on `channel`.
const fn channel_mask(channel: Role) -> u32 {
    match channel {
        Role::A => 0x5555_5555,
        Role::B => 0xAAAA_AAAA,
    }
}

// ─── Context ────────────────────────────────────────────────────────

pub struct DiagContext {
    role: Rds<Role>,
    settings: DeviceSettings,
    arbiter: TestArbiter,
    level: LevelEngine,
    short: ShortCheck,
    to: ToEngine,
    consistency: ConsistencyCheck,
    hs: HsEngine,
    vsup: VsupEngine,
    quals: Aggregator,
    inputs: HVec<InputFsm, MAX_DI>,
    outputs: HVec<OutputFsm, MAX_DO>,
    resets: ResetDetector,
    watchdog: Watchdog,
    /// Enabled inputs per channel, for the short-circuit snapshots.
    channel_inputs: [u32; 2],
    committed_di: Rds<u32>,
    image: ExchangeImage,
}

impl DiagContext {
    /// Create the context for the controller with hardware identity `role_id`.
    pub fn new(role_id: u8, settings: &DeviceSettings) -> Result<Self, FatalFault> {
        let role = Role::from_u8(role_id).ok_or(FatalFault::InvalidRole(role_id))?;
        let topology = settings.topology;

        let mut inputs = HVec::new();
        let mut channel_inputs = [0u32; 2];
        for (pin, input) in settings.inputs.iter().enumerate() {
            let pushed = inputs.push(InputFsm::new(input.flags));
            debug_assert!(pushed.is_ok(), "input count bounded by MAX_DI");
            if input.enabled() {
                channel_inputs[PinTopology::channel_of(pin as PinId).index()] |= 1 << pin;
            }
        }
        let mut outputs = HVec::new();
        for output in settings.outputs.iter() {
            let pushed = outputs.push(OutputFsm::new(output));
            debug_assert!(pushed.is_ok(), "output count bounded by MAX_DO");
        }

        Ok(Self {
            role: Rds::new(role),
            settings: settings.clone(),
            arbiter: TestArbiter::new(),
            level: LevelEngine::new(topology.di_count()),
            short: ShortCheck::default(),
            to: ToEngine::new(settings),
            consistency: ConsistencyCheck::new(settings),
            hs: HsEngine::new(settings),
            vsup: VsupEngine::new(),
            quals: Aggregator::new(topology.di_count(), topology.do_count(), &settings.limits),
            inputs,
            outputs,
            resets: ResetDetector::new(),
            watchdog: Watchdog::new(settings.timing.watchdog, settings.timing.hs_timeout),
            channel_inputs,
            committed_di: Rds::new(0),
            image: ExchangeImage::default(),
        })
    }

    #[inline]
    pub fn role(&self) -> Result<Role, FatalFault> {
        self.role.get()
    }

    #[inline]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Image committed at the end of the last tick.
    #[inline]
    pub fn image(&self) -> &ExchangeImage {
        &self.image
    }

    pub fn input_state(&self, pin: PinId) -> Result<InputState, FatalFault> {
        match self.inputs.get(pin as usize) {
            Some(fsm) => fsm.state(),
            None => Ok(InputState::DontUse),
        }
    }

    pub fn output_state(&self, output: PinId) -> Result<OutputState, FatalFault> {
        match self.outputs.get(output as usize) {
            Some(fsm) => fsm.state(),
            None => Ok(OutputState::DontUse),
        }
    }

    /// Input reported active to the protocol layer in the last tick.
    #[inline]
    pub fn reported(&self, pin: PinId) -> bool {
        self.image.reported(pin)
    }

    /// Output commanded on in the last tick.
    #[inline]
    pub fn commanded(&self, output: PinId) -> bool {
        self.image.commanded(output)
    }

    #[inline]
    pub fn qualifiers(&self) -> &Aggregator {
        &self.quals
    }

    pub fn active_cycles(&self, output: PinId) -> Result<u32, FatalFault> {
        match self.outputs.get(output as usize) {
            Some(fsm) => fsm.active_cycles().sample(),
            None => Ok(0),
        }
    }

    /// Run one tick and route any fatal fault to `failsafe`.
    pub fn run_cycle<I, E, F>(
        &mut self,
        io: &mut I,
        payload: &SafetyPayload,
        exchange: &mut E,
        failsafe: &mut F,
    ) where
        I: SafetyIo,
        E: Exchange,
        F: FailSafe,
    {
        let sibling = exchange.sibling();
        match self.tick(io, payload, &sibling) {
            Ok(image) => exchange.publish(image),
            Err(fault) => {
                error!(%fault, "fatal fault, entering safe state");
                failsafe.halt(fault)
            }
        }
    }

    /// One scheduler tick.
    pub fn tick<I: SafetyIo>(
        &mut self,
        io: &mut I,
        payload: &SafetyPayload,
        sibling: &ExchangeImage,
    ) -> Result<&ExchangeImage, FatalFault> {
        let role = self.role.get()?;
        let topology = self.settings.topology;
        let di_count = topology.di_count();
        let do_count = topology.do_count();

        let scan = Scan::sample(&*io, role, &topology);
        let image = ProcessImage::merge(role, &self.image, sibling);
        let edges = self.resets.detect(payload)?;

        // Input FSMs
        for pin in 0..di_count {
            let touched = self.level.in_flight(pin)? || self.to.in_flight(pin)?;
            let level_state = match self.level.schedule(pin) {
                Some(s) => s.state()?,
                None => continue,
            };
            let view = InputView {
                value: image.value(pin),
                main: image.di_main[pin as usize],
                level: image.di_level[pin as usize],
                touched,
                level_state,
                reset: edges.input(pin),
            };
            let action = self.inputs[pin as usize].step(pin, &view)?;
            self.apply_input_action(pin, action)?;
        }

        // Output FSMs
        for output in 0..do_count {
            let view = OutputView {
                request: payload.output_requested(output),
                main: image.do_main[output as usize],
                reset: edges.output(output),
            };
            if self.outputs[output as usize].step(output, &view)? == OutputAction::Recovered {
                if let Some(q) = self.quals.output(output) {
                    q.clear_all();
                }
                self.quals.vsup.clear();
            }
        }

        let hosted = self.hosting_masks()?;
        let busy = self.busy_slots()?;
        self.arbiter.begin_tick(busy);
        let mut hs_touched = 0u32;
        for output in 0..do_count {
            if self.hs.in_flight(output)? {
                hs_touched |= 1 << output;
            }
        }

        // Running test steps
        {
            let mut cx = StepCtx {
                role,
                topology: &topology,
                io: &mut *io,
                scan: &scan,
                quals: &mut self.quals,
                watchdog: &mut self.watchdog,
            };
            for pin in 0..di_count {
                let mask = self.channel_inputs[PinTopology::channel_of(pin).index()];
                self.level.exec(pin, mask, &mut self.short, &mut cx)?;
            }
            for channel in [Role::A, Role::B] {
                self.to.exec(channel, &mut cx)?;
            }
            for output in 0..do_count {
                if self.hs.exec(output, &mut cx)? == HsStep::Completed {
                    self.outputs[output as usize].hs_completed();
                }
            }
            self.vsup.exec(hosted.active_outputs, &mut cx)?;
        }

        self.poll_tests(&hosted)?;
        for output in 0..do_count {
            if self.hs.in_flight(output)? {
                hs_touched |= 1 << output;
            }
        }

        // Cross checks
        self.check_consistency(&image)?;
        if !busy.contains(Slots::VSUP) && !self.vsup.in_flight()? {
            self.check_pin_states(&scan, hs_touched)?;
        }
        for output in 0..do_count {
            let live = self.quals.output_live(output)?;
            self.outputs[output as usize].sweep(output, live)?;
        }

        // Drive
        let mut commanded = 0u32;
        for output in 0..do_count {
            let partner_error = self.settings.output(output).is_some_and(|o| o.dual())
                && match topology.partner_do(output) {
                    Some(p) => self.outputs[p as usize].state()? == OutputState::Error,
                    None => false,
                };
            let hs_running = self.hs.in_flight(output)?;
            let on = self.outputs[output as usize].command(hs_running, partner_error)?;
            if topology.is_do_owner(role, output) {
                io.set_output(output, on);
            }
            if on {
                commanded |= 1 << output;
            }
        }
        self.to.drive(role, io)?;

        self.commit(role, &scan, sibling, commanded)?;
        self.supervise(&hosted)?;
        Ok(&self.image)
    }

    fn apply_input_action(&mut self, pin: PinId, action: InputAction) -> Result<(), FatalFault> {
        match action {
            InputAction::Activated | InputAction::RetryFirst => {
                if let Some(s) = self.level.schedule_mut(pin) {
                    s.rearm_first();
                }
            }
            InputAction::Deactivated => {
                if let Some(q) = self.quals.input(pin) {
                    q.clear_tests();
                }
                if let Some(s) = self.level.schedule_mut(pin) {
                    s.reset()?;
                }
            }
            InputAction::Recovered => {
                if let Some(q) = self.quals.input(pin) {
                    q.clear_all();
                }
                if let Some(s) = self.level.schedule_mut(pin) {
                    s.reset()?;
                }
                self.consistency.clear(PinTopology::pair_of(pin));
            }
            InputAction::None | InputAction::Promoted | InputAction::Faulted => {}
        }
        Ok(())
    }

    /// Slots occupied by tests executing at the start of the tick.
    fn busy_slots(&self) -> Result<Slots, FatalFault> {
        let topology = self.settings.topology;
        let mut main = 0u32;
        for pin in 0..topology.di_count() {
            main += self.level.in_flight(pin)? as u32;
        }
        for channel in [Role::A, Role::B] {
            main += self.to.schedule(channel).is_exec()? as u32;
        }
        let hs = self.hs.any_in_flight()?;
        for output in 0..topology.do_count() {
            main += self.hs.in_flight(output)? as u32;
        }
        let vsup = self.vsup.in_flight()?;

        if main > 1 || (hs && vsup) {
            error!(main, hs, vsup, "mutually exclusive tests executing");
            return Err(FatalFault::ExclusionViolated);
        }
        let mut slots = Slots::empty();
        slots.set(Slots::MAIN, main == 1);
        slots.set(Slots::HS, hs);
        slots.set(Slots::VSUP, vsup);
        Ok(slots)
    }

    fn hosting_masks(&self) -> Result<Hosted, FatalFault> {
        let mut hosted = Hosted::default();
        for (pin, fsm) in self.inputs.iter().enumerate() {
            match fsm.state()? {
                InputState::ActiveWaitTest => hosted.waiting |= 1 << pin,
                InputState::ActiveTestedValid => hosted.tested_valid |= 1 << pin,
                _ => {}
            }
        }
        for (output, fsm) in self.outputs.iter().enumerate() {
            if fsm.state()? == OutputState::Active {
                hosted.active_outputs |= 1 << output;
            }
        }
        hosted.any_output = self.settings.outputs.iter().any(|o| o.enabled());
        Ok(hosted)
    }

    /// First-test polls of every engine, then cyclic polls.
    fn poll_tests(&mut self, hosted: &Hosted) -> Result<(), FatalFault> {
        let topology = self.settings.topology;
        let t = self.settings.timing;
        let arbiter = &mut self.arbiter;

        for pin in 0..topology.di_count() {
            if hosted.waiting & (1 << pin) == 0 {
                continue;
            }
            if let Some(s) = self.level.schedule_mut(pin) {
                s.poll(Half::First, t.level_first, SlotKind::Main, arbiter)?;
            }
        }
        for output in 0..topology.do_count() {
            if hosted.active_outputs & (1 << output) == 0 {
                continue;
            }
            if let Some(s) = self.hs.schedule_mut(output) {
                s.poll(Half::First, t.hs_first, SlotKind::Hs, arbiter)?;
            }
        }

        for pin in 0..topology.di_count() {
            let Some(s) = self.level.schedule_mut(pin) else {
                continue;
            };
            if hosted.tested_valid & (1 << pin) != 0 {
                s.poll(Half::Cyclic, t.level_cyclic, SlotKind::Main, arbiter)?;
            } else if hosted.waiting & (1 << pin) == 0 && !s.is_exec()? {
                s.reset()?;
            }
        }
        for channel in [Role::A, Role::B] {
            if self.to.hosted(channel, hosted.tested_valid)? {
                let poll = self.to.schedule_mut(channel).poll(
                    Half::Cyclic,
                    t.to_cyclic,
                    SlotKind::Main,
                    arbiter,
                )?;
                if poll == Poll::Started {
                    self.to.begin(channel, hosted.tested_valid)?;
                }
            } else if !self.to.schedule(channel).is_exec()? {
                self.to.schedule_mut(channel).reset()?;
            }
        }
        for output in 0..topology.do_count() {
            let Some(s) = self.hs.schedule_mut(output) else {
                continue;
            };
            if hosted.active_outputs & (1 << output) != 0 {
                s.poll(Half::Cyclic, t.hs_cyclic, SlotKind::Hs, arbiter)?;
            } else if !s.is_exec()? {
                s.reset()?;
            }
        }
        if hosted.any_output {
            self.vsup
                .schedule_mut()
                .poll(Half::Cyclic, t.vsup_cyclic, SlotKind::Vsup, arbiter)?;
        }
        Ok(())
    }

    fn check_consistency(&mut self, image: &ProcessImage) -> Result<(), FatalFault> {
        for pair in 0..self.settings.topology.di_pair_count() {
            if !self.consistency.configured(pair)? {
                continue;
            }
            let (even, odd) = (pair * 2, pair * 2 + 1);
            let mut skip = false;
            for pin in [even, odd] {
                skip |= self.inputs[pin as usize].state()? == InputState::DontUse
                    || self.level.in_flight(pin)?
                    || self.to.in_flight(pin)?;
            }
            if skip {
                continue;
            }
            self.consistency.check(
                pair,
                image.value(even),
                image.value(odd),
                &mut self.quals,
                &mut self.watchdog,
            )?;
        }
        Ok(())
    }

    /// Previous command against shared feedback, outside HS and VSUP tests.
    ///
    /// `hs_touched` has a bit per output whose HS-Test ran at any point in
    /// this tick.
    fn check_pin_states(&mut self, scan: &Scan, hs_touched: u32) -> Result<(), FatalFault> {
        for output in 0..self.settings.topology.do_count() {
            if hs_touched & (1 << output) != 0
                || self.outputs[output as usize].state()? == OutputState::DontUse
            {
                continue;
            }
            let expected_on = self.image.commanded(output);
            let energised = !scan.discharged(output);
            let Some(q) = self.quals.output(output) else {
                continue;
            };
            if expected_on == energised {
                q.pin_check.pass()?;
            } else if q.pin_check.fail()? {
                error!(output, expected_on, "output pin state error confirmed");
            } else {
                warn!(output, expected_on, count = q.pin_check.count()?, "output pin state mismatch");
            }
        }
        Ok(())
    }

    fn commit(
        &mut self,
        role: Role,
        scan: &Scan,
        sibling: &ExchangeImage,
        commanded: u32,
    ) -> Result<(), FatalFault> {
        let topology = self.settings.topology;
        let mut values = self.committed_di.get()?;
        for pin in topology.channel_inputs(role) {
            if self.inputs[pin as usize].state()? == InputState::DontUse {
                values &= !(1 << pin);
            } else if !(self.level.in_flight(pin)? || self.to.in_flight(pin)?) {
                if scan.di(pin) {
                    values |= 1 << pin;
                } else {
                    values &= !(1 << pin);
                }
            }
        }
        self.committed_di.set(values);

        self.quals.aggregate()?;
        self.quals.commit()?;

        let mut image = ExchangeImage {
            sequence: self.image.sequence.wrapping_add(1),
            di_values: values,
            do_commanded: commanded,
            ..ExchangeImage::default()
        };
        for pin in 0..topology.di_count() {
            let p = pin as usize;
            let q = &self.quals.inputs[p];
            image.di_main[p] = q.main.committed()?;
            image.di_level[p] = q.level.qualifier()?;
            image.di_state[p] = self.inputs[p].state()?;
        }
        for output in 0..topology.do_count() {
            let o = output as usize;
            image.do_main[o] = self.quals.outputs[o].main.committed()?;
            image.do_state[o] = self.outputs[o].state()?;
        }
        for pin in 0..topology.di_count() {
            let p = pin as usize;
            let main = image.di_main[p].combine(sibling.di_main[p]);
            let partner = match topology.partner_di(pin) {
                Some(other) => {
                    let o = other as usize;
                    Some((image.di_state[o], image.di_main[o].combine(sibling.di_main[o])))
                }
                None => None,
            };
            let on = input::reported(image.di_state[p], self.inputs[p].dual(), partner, main);
            image.set_reported(pin, on);
        }
        self.image = image;
        Ok(())
    }

    fn supervise(&mut self, hosted: &Hosted) -> Result<(), FatalFault> {
        let mut contacts_hosted = 0u32;
        for channel in [Role::A, Role::B] {
            if self.to.hosted(channel, hosted.tested_valid)? {
                contacts_hosted |= 1 << channel.index();
            }
        }

        self.watchdog
            .observe(Watched::Level, hosted.waiting | hosted.tested_valid)?;
        self.watchdog.observe(Watched::To, contacts_hosted)?;
        self.watchdog
            .observe(Watched::Consistency, self.consistency.configured_mask()?)?;
        self.watchdog.observe(Watched::Hs, hosted.active_outputs)?;
        self.watchdog
            .observe(Watched::Vsup, hosted.any_output as u32)?;

        if self.watchdog.tick()? {
            for (output, fsm) in self.outputs.iter().enumerate() {
                if fsm.state()? == OutputState::Active {
                    self.watchdog
                        .check_hs_overdue(output as u8, fsm.active_cycles().sample()?)?;
                }
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for DiagContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiagContext")
            .field("role", &self.role)
            .field("sequence", &self.image.sequence)
            .field("di_reported", &self.image.di_reported)
            .field("do_commanded", &self.image.do_commanded)
            .finish_non_exhaustive()
    }
}

/// Hosting conditions sampled after the FSMs ran.
#[derive(Debug, Clone, Copy, Default)]
struct Hosted {
    waiting: u32,
    tested_valid: u32,
    active_outputs: u32,
    any_output: bool,
}
