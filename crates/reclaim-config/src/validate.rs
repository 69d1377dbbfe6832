//! Validation helpers and parsing utilities for configuration documents.

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ExecutionModel;

pub(crate) fn parse_millis(value: &Value, field: &str, range: (u64, u64)) -> ConfigResult<u64> {
    let millis = value.as_u64().ok_or_else(|| {
        ConfigError::invalid(
            field,
            Some(value.to_string()),
            "must be a non-negative integer",
        )
    })?;
    let (min, max) = range;
    if !(min..=max).contains(&millis) {
        return Err(ConfigError::invalid(
            field,
            Some(millis.to_string()),
            "out of range",
        ));
    }
    Ok(millis)
}

pub(crate) fn parse_execution_model(value: &Value, field: &str) -> ConfigResult<ExecutionModel> {
    match value.as_str() {
        Some("local") => Ok(ExecutionModel::Local),
        Some("remote") => Ok(ExecutionModel::Remote),
        _ => Err(ConfigError::invalid(
            field,
            Some(value.to_string()),
            "must be 'local' or 'remote'",
        )),
    }
}

pub(crate) fn parse_log_level(value: &Value, field: &str, allowed: &[&str]) -> ConfigResult<String> {
    let level = value
        .as_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ConfigError::invalid(field, Some(value.to_string()), "must be a string"))?;
    if allowed.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::invalid(field, Some(level), "unknown log level"))
    }
}

pub(crate) fn parse_log_format(value: &Value, field: &str) -> ConfigResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(format) if format == "json" || format == "pretty" => {
            Ok(Some(format.clone()))
        }
        other => Err(ConfigError::invalid(
            field,
            Some(other.to_string()),
            "must be 'json' or 'pretty'",
        )),
    }
}
