//! Error types for configuration operations.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was not a JSON object.
    #[error("configuration document must be an object")]
    NotAnObject,
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Field is not part of the recovery policy.
    #[error("unknown configuration field")]
    UnknownField {
        /// Name of the unexpected field.
        field: String,
    },
    /// Raw text could not be parsed as JSON.
    #[error("configuration document is not valid json")]
    Parse {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: Option<String>, reason: &'static str) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            value,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn config_error_messages_are_constant() {
        let invalid = ConfigError::invalid("auto_close_delay_ms", Some("0".into()), "out of range");
        assert_eq!(invalid.to_string(), "invalid configuration field");
        assert!(invalid.source().is_none());

        let parse = match serde_json::from_str::<serde_json::Value>("{") {
            Ok(_) => None,
            Err(source) => Some(ConfigError::Parse { source }),
        };
        let parse = parse.expect("truncated json should fail to parse");
        assert_eq!(parse.to_string(), "configuration document is not valid json");
        assert!(parse.source().is_some());

        let unknown = ConfigError::UnknownField {
            field: "retries".into(),
        };
        assert_eq!(unknown.to_string(), "unknown configuration field");
    }
}
