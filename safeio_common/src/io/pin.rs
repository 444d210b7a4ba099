//! Controller roles and pin topology.
//!
//! Every DI/DO is identified by a global pin index. The index parity selects
//! the channel (controller A = even, controller B = odd), the index pair
//! `(2k, 2k+1)` forms the dual-channel pair `k`, and `pin / 2` is the local
//! index on the owning controller.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_DI, MAX_DO};

/// Global pin index of a DI or DO.
pub type PinId = u8;

/// Dual-channel pair identifier (`pin / 2`).
pub type PairId = u8;

// ─── Role ───────────────────────────────────────────────────────────

/// Identity of the microcontroller running this engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Controller 1, owns the even-indexed channel.
    A = 0,
    /// Controller 2, owns the odd-indexed channel.
    B = 1,
}

impl Role {
    /// Convert from the raw hardware identity strap. `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// The other controller.
    #[inline]
    pub const fn sibling(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Channel index (0 for A, 1 for B).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            _ => Err(format!("unknown controller role: {s:?}, expected \"A\" or \"B\"")),
        }
    }
}

// ─── PinTopology ────────────────────────────────────────────────────

/// Pin counts and the index arithmetic that maps pins to channels,
/// dual-channel pairs and per-controller local indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinTopology {
    di_count: u8,
    do_count: u8,
}

impl PinTopology {
    /// Create a topology. Counts are clamped to `MAX_DI` / `MAX_DO`.
    pub const fn new(di_count: u8, do_count: u8) -> Self {
        let di = if di_count as usize > MAX_DI { MAX_DI as u8 } else { di_count };
        let d_o = if do_count as usize > MAX_DO { MAX_DO as u8 } else { do_count };
        Self {
            di_count: di,
            do_count: d_o,
        }
    }

    #[inline]
    pub const fn di_count(&self) -> u8 {
        self.di_count
    }

    #[inline]
    pub const fn do_count(&self) -> u8 {
        self.do_count
    }

    /// Controller whose channel carries this pin.
    #[inline]
    pub const fn channel_of(pin: PinId) -> Role {
        if pin & 1 == 0 { Role::A } else { Role::B }
    }

    /// Whether `role` owns (reads or drives) this pin.
    ///
    /// Ownership alternates by controller identity XOR pin parity.
    #[inline]
    pub const fn is_owner(role: Role, pin: PinId) -> bool {
        (role as u8) ^ (pin & 1) == 0
    }

    #[inline]
    pub const fn is_di_owner(&self, role: Role, pin: PinId) -> bool {
        pin < self.di_count && Self::is_owner(role, pin)
    }

    #[inline]
    pub const fn is_do_owner(&self, role: Role, pin: PinId) -> bool {
        pin < self.do_count && Self::is_owner(role, pin)
    }

    /// Dual-channel pair of a pin.
    #[inline]
    pub const fn pair_of(pin: PinId) -> PairId {
        pin / 2
    }

    /// Local index of a pin on its owning controller.
    #[inline]
    pub const fn local_index(pin: PinId) -> u8 {
        pin / 2
    }

    /// Global DI index from a controller's local index.
    #[inline]
    pub const fn global_di(role: Role, local: u8) -> PinId {
        local * 2 + role as u8
    }

    /// The other member of the dual-channel pair, if it exists.
    #[inline]
    pub const fn partner_di(&self, pin: PinId) -> Option<PinId> {
        let other = pin ^ 1;
        if other < self.di_count { Some(other) } else { None }
    }

    #[inline]
    pub const fn partner_do(&self, pin: PinId) -> Option<PinId> {
        let other = pin ^ 1;
        if other < self.do_count { Some(other) } else { None }
    }

    /// Number of complete DI pairs.
    #[inline]
    pub const fn di_pair_count(&self) -> u8 {
        self.di_count / 2
    }

    /// DIs on the given controller channel.
    pub fn channel_inputs(&self, channel: Role) -> impl Iterator<Item = PinId> + '_ {
        (channel as u8..self.di_count).step_by(2)
    }
}
