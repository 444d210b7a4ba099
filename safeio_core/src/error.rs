//! Error module root.
//!
//! Transient failures live in hysteresis counters, confirmed faults in
//! latching qualifiers. Neither is a Rust error: only [`FatalFault`]s travel
//! through `Result`.
//!
//! [`FatalFault`]: safeio_common::diag::fault::FatalFault

pub mod counter;
pub mod qualifier;
