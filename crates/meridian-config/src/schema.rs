//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use meridian_telemetry::{LogConfig, MetricsConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application section: how failures are presented.
///
/// # Example
///
/// ```
/// use meridian_config::AppConfig;
///
/// let config = AppConfig {
///     project_root: "/srv/app".into(),
///     debug: true,
///     ..Default::default()
/// };
/// assert_eq!(config.environment, "production");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Directory whose path is replaced by `{PROJECT_ROOT}` in diagnostics.
    /// Empty disables the replacement.
    #[serde(default)]
    pub project_root: PathBuf,

    /// Environment name reported in problem documents.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Whether problem documents include the sanitized failure chain.
    #[serde(default)]
    pub debug: bool,

    /// Path prefix that always negotiates JSON.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Whether frame arguments are reduced to type summaries.
    /// `None` means "redact unless debug".
    #[serde(default)]
    pub redact_arguments: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::new(),
            environment: default_environment(),
            debug: false,
            api_prefix: default_api_prefix(),
            redact_arguments: None,
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

/// Static asset section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StaticAssetsConfig {
    /// Serve files from `root` before routing.
    #[serde(default)]
    pub enabled: bool,

    /// Directory files are served from.
    #[serde(default = "default_static_root")]
    pub root: PathBuf,

    /// `Cache-Control: max-age` in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Serve files whose name starts with a dot.
    #[serde(default)]
    pub serve_hidden: bool,
}

impl Default for StaticAssetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: default_static_root(),
            max_age_secs: default_max_age(),
            serve_hidden: false,
        }
    }
}

fn default_static_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_max_age() -> u64 {
    3600
}

/// Server configuration section.
///
/// # Example
///
/// ```
/// use meridian_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name used in logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LogConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TelemetryConfigSection {
    /// Returns the logging settings with the section's service name applied.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            service_name: self.service_name.clone(),
            ..self.logging.clone()
        }
    }
}

fn default_service_name() -> String {
    "meridian".to_string()
}
