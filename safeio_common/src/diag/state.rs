//! State enums for the diagnostic engine.
//!
//! All enums use `#[repr(u8)]` so they can be stored in redundant cells and
//! carried in the exchange image. `from_u8` returns `None` for any encoding
//! that is not a valid variant; the engine treats that as a fatal fault.

use core::fmt;
use serde::{Deserialize, Serialize};

// ─── Scheduler ──────────────────────────────────────────────────────

/// Six-state shape shared by every test instance.
///
/// `Wait*` counts ticks up to the test's threshold, `Req*` parks while another
/// test occupies the execution slot, `Exec*` runs one numbered step per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TestState {
    WaitFirst = 0,
    ReqFirst = 1,
    ExecFirst = 2,
    WaitCyclic = 3,
    ReqCyclic = 4,
    ExecCyclic = 5,
}

impl TestState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::WaitFirst),
            1 => Some(Self::ReqFirst),
            2 => Some(Self::ExecFirst),
            3 => Some(Self::WaitCyclic),
            4 => Some(Self::ReqCyclic),
            5 => Some(Self::ExecCyclic),
            _ => None,
        }
    }

    /// Test currently occupies the execution slot.
    #[inline]
    pub const fn is_exec(self) -> bool {
        matches!(self, Self::ExecFirst | Self::ExecCyclic)
    }

    /// Counter is frozen.
    #[inline]
    pub const fn is_req(self) -> bool {
        matches!(self, Self::ReqFirst | Self::ReqCyclic)
    }

    /// Belongs to the first-test half of the shape.
    #[inline]
    pub const fn is_first(self) -> bool {
        matches!(self, Self::WaitFirst | Self::ReqFirst | Self::ExecFirst)
    }
}

impl Default for TestState {
    fn default() -> Self {
        Self::WaitFirst
    }
}

// ─── Pin FSMs ───────────────────────────────────────────────────────

/// Top-level state of one safety input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputState {
    /// Reads inactive.
    Inactive = 0,
    /// Reads active, first Level-Test not yet passed.
    ActiveWaitTest = 1,
    /// Reads active and tested; may be reported active.
    ActiveTestedValid = 2,
    /// Confirmed fault, reported inactive until reset.
    Error = 3,
    /// Disabled by configuration. Absorbing.
    DontUse = 4,
}

impl InputState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Inactive),
            1 => Some(Self::ActiveWaitTest),
            2 => Some(Self::ActiveTestedValid),
            3 => Some(Self::Error),
            4 => Some(Self::DontUse),
            _ => None,
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::Inactive
    }
}

/// Top-level state of one safety output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputState {
    Inactive = 0,
    Active = 1,
    /// Confirmed fault, output off until reset.
    Error = 2,
    /// Disabled by configuration. Absorbing.
    DontUse = 3,
}

impl OutputState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            2 => Some(Self::Error),
            3 => Some(Self::DontUse),
            _ => None,
        }
    }
}

impl Default for OutputState {
    fn default() -> Self {
        Self::Inactive
    }
}

// ─── Qualifier ──────────────────────────────────────────────────────

/// Tri-state verdict of one diagnostic for one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Qualifier {
    NotAvailable = 0,
    Ok = 1,
    Error = 2,
}

impl Qualifier {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NotAvailable),
            1 => Some(Self::Ok),
            2 => Some(Self::Error),
            _ => None,
        }
    }

    /// Merge two verdicts: Error dominates, then Ok, then NotAvailable.
    #[inline]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Error, _) | (_, Self::Error) => Self::Error,
            (Self::Ok, _) | (_, Self::Ok) => Self::Ok,
            _ => Self::NotAvailable,
        }
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl Default for Qualifier {
    fn default() -> Self {
        Self::NotAvailable
    }
}

// ─── Test kinds ─────────────────────────────────────────────────────

/// Input-side diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputTest {
    Level = 0,
    To = 1,
    Short = 2,
    Consistency = 3,
}

/// Output-side diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputTest {
    Hs = 0,
    Vsup = 1,
    PinState = 2,
}

/// Any diagnostic, for logs and fault reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestKind {
    Input(InputTest),
    Output(OutputTest),
}

impl TestKind {
    pub const LEVEL: Self = Self::Input(InputTest::Level);
    pub const TO: Self = Self::Input(InputTest::To);
    pub const SHORT: Self = Self::Input(InputTest::Short);
    pub const CONSISTENCY: Self = Self::Input(InputTest::Consistency);
    pub const HS: Self = Self::Output(OutputTest::Hs);
    pub const VSUP: Self = Self::Output(OutputTest::Vsup);
    pub const PIN_STATE: Self = Self::Output(OutputTest::PinState);

    pub const fn name(self) -> &'static str {
        match self {
            Self::Input(InputTest::Level) => "level",
            Self::Input(InputTest::To) => "to",
            Self::Input(InputTest::Short) => "short",
            Self::Input(InputTest::Consistency) => "consistency",
            Self::Output(OutputTest::Hs) => "hs",
            Self::Output(OutputTest::Vsup) => "vsup",
            Self::Output(OutputTest::PinState) => "pin_state",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
