//! Pin identity, topology and per-pin configuration.

pub mod config;
pub mod pin;
