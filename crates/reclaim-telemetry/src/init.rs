//! Tracing subscriber installation for reclaim hosts.
//!
//! Hosts build a [`LoggingConfig`], usually from the serialised recovery
//! config document, and call [`init_logging`] once at startup. `RUST_LOG`
//! overrides the configured level.

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Level used when neither `RUST_LOG` nor the config document sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty output for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse `json` or `pretty`, ignoring case.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if label.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }

    /// Label accepted by [`LogFormat::parse`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

/// Settings for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier logged at startup and exposed through [`build_sha`].
    pub build_sha: &'a str,
}

impl<'a> LoggingConfig<'a> {
    /// Read `log_level` and `log_format` from a serialised recovery config.
    ///
    /// Missing or null keys fall back to [`DEFAULT_LOG_LEVEL`] and
    /// [`LogFormat::infer`].
    #[must_use]
    pub fn from_document(document: &'a Value, build_sha: &'a str) -> Self {
        Self {
            level: document
                .get("log_level")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_LOG_LEVEL),
            format: log_format_from_config(Some(document)).unwrap_or_else(LogFormat::infer),
            build_sha,
        }
    }
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already set.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true).with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;

    info!(
        build_sha = config.build_sha,
        format = config.format.as_str(),
        "logging initialised"
    );
    Ok(())
}

/// Build identifier recorded by the first [`init_logging`] call, or `dev`.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Format named by the document's `log_format` key.
///
/// Returns `None` when the key is absent or null. Unrecognised labels fall
/// back to [`LogFormat::infer`].
#[must_use]
pub fn log_format_from_config(config: Option<&Value>) -> Option<LogFormat> {
    let label = config?.get("log_format")?.as_str()?;
    Some(LogFormat::parse(label).unwrap_or_else(LogFormat::infer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_labels() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(LogFormat::Pretty.as_str()), Some(LogFormat::Pretty));
        assert!(LogFormat::parse("xml").is_none());

        assert_eq!(
            log_format_from_config(Some(&json!({"log_format": "unknown"}))),
            Some(LogFormat::infer())
        );
        assert!(log_format_from_config(Some(&json!({"log_format": null}))).is_none());
        assert!(log_format_from_config(None).is_none());
    }

    #[test]
    fn settings_come_from_config_document() {
        let document = json!({
            "auto_close_delay_ms": 3000,
            "log_level": "debug",
            "log_format": "json",
        });
        let config = LoggingConfig::from_document(&document, "abc123");
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);

        let empty = json!({});
        let fallback = LoggingConfig::from_document(&empty, "abc123");
        assert_eq!(fallback.level, DEFAULT_LOG_LEVEL);
        assert_eq!(fallback.format, LogFormat::infer());
    }

    #[test]
    fn second_install_is_an_error() {
        let config = LoggingConfig {
            level: "warn",
            format: LogFormat::Pretty,
            build_sha: "test-sha",
        };
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "test-sha");
    }
}
