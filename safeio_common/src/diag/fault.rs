//! Fatal integrity violations.
//!
//! Diagnostic verdicts are never errors; they live in qualifiers and FSM
//! states. A [`FatalFault`] means the engine can no longer trust its own
//! state and must hand control to the fail-safe handler.

use thiserror::Error;

use super::state::TestKind;

/// Invariant violation routed to the non-returning fail-safe handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatalFault {
    /// Value and inverted shadow of a redundant cell disagree.
    #[error("redundant storage mismatch")]
    RdsCorruption,

    /// A redundant cell holds a consistent but out-of-domain encoding.
    #[error("invalid state encoding {raw:#x}")]
    InvalidEncoding { raw: u32 },

    /// Controller identity strap is neither A nor B.
    #[error("invalid controller identity {0}")]
    InvalidRole(u8),

    /// A test's step counter ran past its last defined step.
    #[error("{test} test step {step} out of range")]
    StepOutOfRange { test: TestKind, step: u32 },

    /// A required test did not execute within the watchdog period.
    #[error("{test} test #{index} not executed within watchdog period")]
    DiagnosticTimeout { test: TestKind, index: u8 },

    /// An output stayed on longer than allowed without a completed HS-Test.
    #[error("output {output} active for {cycles} cycles without HS-Test")]
    HsTestOverdue { output: u8, cycles: u32 },

    /// Two mutually exclusive tests were executing at the same time.
    #[error("mutually exclusive tests executing concurrently")]
    ExclusionViolated,
}
