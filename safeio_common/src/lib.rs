//! Safety I/O Common Library
//!
//! Shared, allocation-free types for the dual-controller safety I/O engine:
//! controller roles and pin topology, diagnostic state enums and qualifiers,
//! fatal fault taxonomy, the inter-processor exchange image, and the TOML
//! configuration model with its loader.
//!
//! # Module Structure
//!
//! - [`consts`] - Compile-time pin bounds and timing defaults
//! - [`config`] - Configuration loading trait, shared section, log level
//! - [`io`] - Roles, pin topology, per-pin configuration
//! - [`diag`] - Test/FSM state enums, qualifiers, faults, exchange image
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use safeio_common::prelude::*;
//!
//! let topo = PinTopology::new(4, 2);
//! assert_eq!(topo.partner_di(1), Some(0));
//! assert!(topo.is_di_owner(Role::A, 0));
//! ```

pub mod config;
pub mod consts;
pub mod diag;
pub mod io;
pub mod prelude;
