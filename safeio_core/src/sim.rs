//! Host-side simulation: an electrical board model shared by two
//! controllers running in lock-step.

pub mod board;
pub mod pair;

pub use board::{DiFault, SimBoard, SimFault};
pub use pair::{ExchangeBus, LockstepPair};
