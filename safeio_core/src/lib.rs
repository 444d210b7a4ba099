//! # Safety I/O Diagnostic Engine
//!
//! Diagnostic core of a two-channel safety I/O board. Two microcontrollers
//! run this engine in lock-step; every tick each instance samples its own
//! input channel, runs the scheduled hardware tests (Level, TO, consistency,
//! short, HS and VSUP), qualifies the results, drives the input and output
//! state machines and exchanges its committed image with the sibling.
//!
//! ## Integrity
//!
//! Every safety-relevant variable is stored as an [`rds::Rds`] cell (value
//! plus bit-inverted copy). A mismatch, an impossible encoded state or a
//! missed diagnostic deadline is a [`FatalFault`] routed to
//! [`hal::FailSafe`]; test verdicts are never errors.
//!
//! ## Zero-Allocation Tick
//!
//! All per-pin state is sized at startup in `heapless` vectors bounded by
//! `MAX_DI`/`MAX_DO`. [`context::DiagContext::tick`] allocates nothing.
//!
//! [`FatalFault`]: safeio_common::diag::fault::FatalFault

pub mod config;
pub mod context;
pub mod cycle;
pub mod diag;
pub mod error;
pub mod hal;
pub mod rds;
pub mod sim;
pub mod state;
pub mod watchdog;
