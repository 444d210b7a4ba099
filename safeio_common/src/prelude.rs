//! Prelude module for common re-exports.
//!
//! ```rust
//! use safeio_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, DeviceConfig, LogLevel, SharedConfig};
pub use crate::diag::config::{DiagConfig, ErrorLimits, ToMode, ToTiming};
pub use crate::io::config::{InputConfig, InputKind, OutputConfig, PinFlags};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_DI, MAX_DO};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::io::pin::{PairId, PinId, PinTopology, Role};

// ─── Diagnostics ────────────────────────────────────────────────────
pub use crate::diag::exchange::{ExchangeImage, SafetyPayload};
pub use crate::diag::fault::FatalFault;
pub use crate::diag::state::{
    InputState, InputTest, OutputState, OutputTest, Qualifier, TestKind, TestState,
};
