//! Electrical model of a two-channel safety I/O board.
//!
//! Both controllers read the state latched at the end of the previous cycle
//! and write drive commands into a pending set; [`SimBoard::latch`] applies
//! all pending commands at once, so neither controller sees the other's
//! commands within the same cycle.

use core::str::FromStr;

use safeio_common::consts::{MAX_DI, MAX_DO};
use safeio_common::io::pin::{PinId, PinTopology, Role};
use tracing::{debug, info};

use crate::config::DeviceSettings;
use crate::hal::SafetyIo;

/// Physical input fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiFault {
    StuckActive,
    StuckInactive,
}

/// Fault that can be injected into a running board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    Input(PinId, DiFault),
    /// Two inputs wired together.
    Short(PinId, PinId),
    /// Contact fed from a foreign supply instead of its TO line.
    ToBypass(PinId),
    /// High-side driver welded on.
    HsStuck(PinId),
    /// Supply cutoff no longer switches.
    VsupStuck,
}

impl FromStr for SimFault {
    type Err = String;

    /// `stuck-active:N`, `stuck-inactive:N`, `short:N-M`, `to-bypass:N`,
    /// `hs-stuck:N`, `vsup-stuck`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pin = |v: &str| {
            v.trim()
                .parse::<PinId>()
                .map_err(|e| format!("invalid pin {v:?}: {e}"))
        };
        let (kind, arg) = s.split_once(':').unwrap_or((s, ""));
        match kind {
            "stuck-active" => Ok(Self::Input(pin(arg)?, DiFault::StuckActive)),
            "stuck-inactive" => Ok(Self::Input(pin(arg)?, DiFault::StuckInactive)),
            "short" => {
                let (a, b) = arg
                    .split_once('-')
                    .ok_or_else(|| format!("short needs two pins, got {arg:?}"))?;
                Ok(Self::Short(pin(a)?, pin(b)?))
            }
            "to-bypass" => Ok(Self::ToBypass(pin(arg)?)),
            "hs-stuck" => Ok(Self::HsStuck(pin(arg)?)),
            "vsup-stuck" => Ok(Self::VsupStuck),
            _ => Err(format!("unknown fault {s:?}")),
        }
    }
}

/// Drive state written by the controllers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Drive {
    drivers: u32,
    discharge: u32,
    test_pulse: u32,
    to_enable: [bool; 2],
    to_level: [bool; 2],
    vsup_test: [bool; 2],
}

#[derive(Debug, Clone)]
pub struct SimBoard {
    topology: PinTopology,
    contacts: u32,
    debounce: [u8; MAX_DI],

    field: u32,
    di_faults: [Option<DiFault>; MAX_DI],
    shorts: Vec<(PinId, PinId)>,
    to_bypass: u32,
    hs_stuck: u32,
    vsup_stuck: bool,

    latched: Drive,
    pending: Drive,
    life_toggles: [u32; 2],

    /// Debounced input values as read by the controllers.
    inputs: u32,
    stable_for: [u8; MAX_DI],
}

impl SimBoard {
    pub fn new(settings: &DeviceSettings) -> Self {
        let mut contacts = 0;
        let mut debounce = [0u8; MAX_DI];
        for (pin, input) in settings.inputs.iter().enumerate() {
            if input.contact() {
                contacts |= 1 << pin;
            }
            debounce[pin] = input.debounce;
        }
        let mut board = Self {
            topology: settings.topology,
            contacts,
            debounce,
            field: 0,
            di_faults: [None; MAX_DI],
            shorts: Vec::new(),
            to_bypass: 0,
            hs_stuck: 0,
            vsup_stuck: false,
            latched: Drive::default(),
            pending: Drive::default(),
            life_toggles: [0; 2],
            inputs: 0,
            stable_for: [0; MAX_DI],
        };
        board.inputs = board.electrical_inputs();
        board
    }

    // ── Field side ──

    /// Sensor state of an input (what the field device signals).
    pub fn set_field(&mut self, pin: PinId, active: bool) {
        if active {
            self.field |= 1 << pin;
        } else {
            self.field &= !(1 << pin);
        }
    }

    pub fn inject(&mut self, fault: SimFault) {
        info!(?fault, "injecting board fault");
        match fault {
            SimFault::Input(pin, kind) => {
                if let Some(slot) = self.di_faults.get_mut(pin as usize) {
                    *slot = Some(kind);
                }
            }
            SimFault::Short(a, b) => self.shorts.push((a, b)),
            SimFault::ToBypass(pin) => self.to_bypass |= 1 << pin,
            SimFault::HsStuck(output) => self.hs_stuck |= 1 << output,
            SimFault::VsupStuck => self.vsup_stuck = true,
        }
    }

    pub fn clear_faults(&mut self) {
        self.di_faults = [None; MAX_DI];
        self.shorts.clear();
        self.to_bypass = 0;
        self.hs_stuck = 0;
        self.vsup_stuck = false;
    }

    // ── Observation ──

    /// Supply rail of an output carries voltage.
    pub fn output_energised(&self, output: PinId) -> bool {
        let bit = 1 << output;
        let driven = (self.latched.drivers | self.hs_stuck) & bit != 0;
        driven && self.supply_on()
    }

    pub fn life_toggles(&self, role: Role) -> u32 {
        self.life_toggles[role.index()]
    }

    /// TO line feeding the contacts of `channel` is high.
    pub fn to_line(&self, channel: Role) -> bool {
        let c = channel.index();
        self.latched.to_enable[c] && self.latched.to_level[c]
    }

    /// `role` is asserting its VSUP cutoff condition.
    pub fn vsup_test(&self, role: Role) -> bool {
        self.latched.vsup_test[role.index()]
    }

    /// Debounced input value as the controllers read it.
    pub fn input(&self, pin: PinId) -> bool {
        self.inputs & (1 << pin) != 0
    }

    fn supply_on(&self) -> bool {
        self.vsup_stuck || !(self.latched.vsup_test[0] || self.latched.vsup_test[1])
    }

    fn electrical_input(&self, pin: PinId) -> bool {
        let bit = 1u32 << pin;
        match self.di_faults[pin as usize] {
            Some(DiFault::StuckActive) => return true,
            Some(DiFault::StuckInactive) => return false,
            None => {}
        }
        let mut value = self.field & bit != 0;
        if self.contacts & !self.to_bypass & bit != 0 {
            value &= self.to_line(PinTopology::channel_of(pin));
        }
        if self.latched.test_pulse & bit != 0 {
            return false;
        }
        for &(a, b) in &self.shorts {
            let other = if a == pin {
                b
            } else if b == pin {
                a
            } else {
                continue;
            };
            if self.latched.test_pulse & (1 << other) != 0 {
                value = false;
            }
        }
        value
    }

    fn electrical_inputs(&self) -> u32 {
        (0..self.topology.di_count())
            .filter(|&p| self.electrical_input(p))
            .fold(0, |mask, p| mask | (1 << p))
    }

    /// Apply the cycle's pending commands and re-evaluate the inputs.
    pub fn latch(&mut self) {
        if self.latched != self.pending {
            debug!(
                drivers = self.pending.drivers,
                discharge = self.pending.discharge,
                test_pulse = self.pending.test_pulse,
                "board drive changed"
            );
        }
        self.latched = self.pending;

        let raw = self.electrical_inputs();
        for pin in 0..self.topology.di_count() {
            let p = pin as usize;
            let bit = 1u32 << pin;
            if (raw ^ self.inputs) & bit == 0 {
                self.stable_for[p] = 0;
                continue;
            }
            if self.stable_for[p] >= self.debounce[p] {
                self.inputs ^= bit;
                self.stable_for[p] = 0;
            } else {
                self.stable_for[p] += 1;
            }
        }
    }

    /// I/O view of one controller.
    pub fn port(&mut self, role: Role) -> BoardPort<'_> {
        BoardPort { board: self, role }
    }
}

/// [`SafetyIo`] of one controller on a [`SimBoard`].
///
/// Commands to pins the controller is not wired to are dropped.
pub struct BoardPort<'a> {
    board: &'a mut SimBoard,
    role: Role,
}

fn assign(mask: &mut u32, pin: PinId, on: bool) {
    if on {
        *mask |= 1 << pin;
    } else {
        *mask &= !(1 << pin);
    }
}

impl SafetyIo for BoardPort<'_> {
    fn read_input(&self, pin: PinId) -> bool {
        PinTopology::is_owner(self.role, pin) && self.board.input(pin)
    }

    fn read_feedback(&self, output: PinId) -> bool {
        (output as usize) < MAX_DO && !self.board.output_energised(output)
    }

    fn set_output(&mut self, output: PinId, on: bool) {
        if PinTopology::is_owner(self.role, output) {
            assign(&mut self.board.pending.drivers, output, on);
        }
    }

    fn set_discharge(&mut self, output: PinId, on: bool) {
        if !PinTopology::is_owner(self.role, output) {
            assign(&mut self.board.pending.discharge, output, on);
        }
    }

    fn set_test_pulse(&mut self, input: PinId, on: bool) {
        if !PinTopology::is_owner(self.role, input) {
            assign(&mut self.board.pending.test_pulse, input, on);
        }
    }

    fn set_to_level(&mut self, channel: Role, high: bool) {
        if channel != self.role {
            self.board.pending.to_level[channel.index()] = high;
        }
    }

    fn set_to_enable(&mut self, channel: Role, enable: bool) {
        if channel != self.role {
            self.board.pending.to_enable[channel.index()] = enable;
        }
    }

    fn set_vsup_test(&mut self, on: bool) {
        self.board.pending.vsup_test[self.role.index()] = on;
    }

    fn toggle_life_signal(&mut self) {
        self.board.life_toggles[self.role.index()] += 1;
    }
}
