//! Telemetry errors.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures while installing logging or maintaining the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Subscriber installation error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A recovery collector could not be constructed.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Collector name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// A recovery collector clashed with one already in the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Collector name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be encoded in the text exposition format.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The encoded registry was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}
