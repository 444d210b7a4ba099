//! Top-level pin state machines and reset edge detection.

pub mod input;
pub mod output;
pub mod reset;
