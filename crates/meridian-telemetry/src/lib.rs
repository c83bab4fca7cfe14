//! Observability for Meridian.
//!
//! - **Logging**: structured logs via `tracing-subscriber` (JSON in
//!   production, pretty in development)
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `meridian_requests_total` | Counter | `route`, `status` | Total request count |
//! | `meridian_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `meridian_in_flight_requests` | Gauge | - | Currently processing requests |
//! | `meridian_problems_total` | Counter | `status` | Problem documents created |
//! | `meridian_static_hits_total` | Counter | `not_modified` | Static assets served |
//!
//! # Example
//!
//! ```rust,ignore
//! use meridian_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! init_telemetry(&LogConfig::production(), &MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and metrics together.
///
/// # Errors
///
/// Returns the first initialization error.
pub fn init_telemetry(logging: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    init_metrics(metrics)
}
