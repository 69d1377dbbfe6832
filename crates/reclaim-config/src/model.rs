//! Typed recovery policy and change payloads.
//!
//! # Design
//! - Pure data carriers consumed by the recovery controller and logging setup.
//! - Parsing goes through `validate.rs` so every field is checked before use.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults::{
    AUTO_CLOSE_DELAY_MS, AUTO_CLOSE_DELAY_RANGE, LOG_LEVEL, LOG_LEVELS, RECONCILE_INTERVAL_MS,
    RECONCILE_INTERVAL_RANGE,
};
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{parse_execution_model, parse_log_format, parse_log_level, parse_millis};

/// Where the torrent engine runs relative to this process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionModel {
    /// Same machine and filesystem; path checks are authoritative.
    Local,
    /// Another host; path checks are second-hand.
    #[default]
    Remote,
}

impl ExecutionModel {
    /// Render the model as its lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Recovery policy applied by the controller and its polling driver.
///
/// Deserialising goes through [`RecoveryConfig::from_value`], so serde
/// callers get the same key and range checks as the JSON entry points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Value")]
pub struct RecoveryConfig {
    /// Delay before a resolved session closes on its own (milliseconds).
    pub auto_close_delay_ms: u64,
    /// Snapshot polling cadence for reconciliation (milliseconds).
    pub reconcile_interval_ms: u64,
    /// Engine placement used for classification confidence.
    pub execution_model: ExecutionModel,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Optional log format override (`json` or `pretty`).
    pub log_format: Option<String>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            auto_close_delay_ms: AUTO_CLOSE_DELAY_MS,
            reconcile_interval_ms: RECONCILE_INTERVAL_MS,
            execution_model: ExecutionModel::default(),
            log_level: LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl RecoveryConfig {
    /// Build a config from a JSON document, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object, contains unknown
    /// keys, or any field fails validation.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_patch(value)?;
        Ok(config)
    }

    /// Apply a partial JSON object. Nothing changes unless every field validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch is not an object, names an unknown field,
    /// or carries an invalid value.
    pub fn apply_patch(&mut self, patch: &Value) -> ConfigResult<()> {
        let map = patch.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut next = self.clone();
        next.merge(map)?;
        *self = next;
        Ok(())
    }

    fn merge(&mut self, map: &Map<String, Value>) -> ConfigResult<()> {
        for (field, value) in map {
            match field.as_str() {
                "auto_close_delay_ms" => {
                    self.auto_close_delay_ms = parse_millis(value, field, AUTO_CLOSE_DELAY_RANGE)?;
                }
                "reconcile_interval_ms" => {
                    self.reconcile_interval_ms =
                        parse_millis(value, field, RECONCILE_INTERVAL_RANGE)?;
                }
                "execution_model" => {
                    self.execution_model = parse_execution_model(value, field)?;
                }
                "log_level" => {
                    self.log_level = parse_log_level(value, field, LOG_LEVELS)?;
                }
                "log_format" => {
                    self.log_format = parse_log_format(value, field)?;
                }
                other => {
                    return Err(ConfigError::UnknownField {
                        field: other.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Auto-close delay as a [`Duration`].
    #[must_use]
    pub const fn auto_close_delay(&self) -> Duration {
        Duration::from_millis(self.auto_close_delay_ms)
    }

    /// Reconciliation cadence as a [`Duration`].
    #[must_use]
    pub const fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    /// Render the config back to a JSON document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "auto_close_delay_ms": self.auto_close_delay_ms,
            "reconcile_interval_ms": self.reconcile_interval_ms,
            "execution_model": self.execution_model.as_str(),
            "log_level": self.log_level,
            "log_format": self.log_format,
        })
    }
}

impl TryFrom<Value> for RecoveryConfig {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

impl FromStr for RecoveryConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse { source })?;
        Self::from_value(&value)
    }
}
