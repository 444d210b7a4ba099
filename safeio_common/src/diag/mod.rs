//! Diagnostic engine shared types: state enums, qualifiers, fatal faults,
//! the exchange image and the `[diag]` configuration section.

pub mod config;
pub mod exchange;
pub mod fault;
pub mod state;
