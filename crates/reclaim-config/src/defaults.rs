//! Default values and accepted bounds for recovery policy fields.
//!
//! # Design
//! - Keep bounds next to defaults so validation and documentation agree.

/// Delay before a resolved session closes on its own.
pub(crate) const AUTO_CLOSE_DELAY_MS: u64 = 3_000;
/// Accepted range for `auto_close_delay_ms`.
pub(crate) const AUTO_CLOSE_DELAY_RANGE: (u64, u64) = (1, 600_000);
/// Cadence of snapshot polling for reconciliation.
pub(crate) const RECONCILE_INTERVAL_MS: u64 = 2_000;
/// Accepted range for `reconcile_interval_ms`.
pub(crate) const RECONCILE_INTERVAL_RANGE: (u64, u64) = (100, 600_000);
/// Log level used when the document does not set one.
pub(crate) const LOG_LEVEL: &str = "info";
/// Levels understood by the tracing env filter.
pub(crate) const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
