//! Error types for the recovery controller.

use thiserror::Error;

/// Primary error type for recovery operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecoveryError {
    /// The controller went away before resolving a completion.
    #[error("recovery completion dropped before resolution")]
    CompletionDropped {
        /// Fingerprint the completion was waiting on.
        fingerprint: String,
    },
    /// Internal queue or ledger bookkeeping is inconsistent.
    #[error("recovery controller invariant violated")]
    InvariantViolation {
        /// Invariant that failed.
        invariant: &'static str,
    },
}

/// Convenience alias for recovery results.
pub type RecoveryResult<T> = Result<T, RecoveryError>;
