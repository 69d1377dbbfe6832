//! Error types for daemon adapter calls.

use std::error::Error;
use std::io;

use thiserror::Error;

/// Primary error type surfaced by [`crate::RecoveryClient`] implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation is not supported by the connected daemon.
    #[error("daemon operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// The daemon answered but reported a failure.
    #[error("daemon rejected operation")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Machine-readable error code when the daemon supplied one (`ENOENT`, `13`, ...).
        code: Option<String>,
        /// Human-readable failure description.
        message: String,
    },
    /// The request never produced a daemon answer.
    #[error("daemon transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ClientError {
    /// Build a rejection carrying an optional daemon error code.
    #[must_use]
    pub fn rejected(
        operation: &'static str,
        code: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            operation,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Wrap a transport-level failure.
    pub fn transport(operation: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self::Transport {
            operation,
            source: Box::new(source),
        }
    }

    /// Operation that produced the error.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Unsupported { operation }
            | Self::Rejected { operation, .. }
            | Self::Transport { operation, .. } => operation,
        }
    }

    /// Daemon-reported error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            Self::Unsupported { .. } | Self::Transport { .. } => None,
        }
    }

    /// Best available description of the failure, including transport sources.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Unsupported { operation } => format!("{operation} unsupported"),
            Self::Rejected { message, .. } => message.clone(),
            Self::Transport { source, .. } => source.to_string(),
        }
    }

    /// The underlying IO error kind when the transport source is an [`io::Error`].
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Transport { source, .. } => {
                source.downcast_ref::<io::Error>().map(io::Error::kind)
            }
            Self::Unsupported { .. } | Self::Rejected { .. } => None,
        }
    }

    /// Whether the error indicates a missing capability rather than a failure.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Convenience alias for adapter call results.
pub type ClientResult<T> = Result<T, ClientError>;
