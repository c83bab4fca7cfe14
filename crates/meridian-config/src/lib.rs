//! Typed configuration for Meridian.
//!
//! - TOML and JSON configuration files
//! - `.env` files via `dotenvy`
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`MeridianConfig`] holds every section:
//!
//! - [`AppConfig`] - project root, environment name, debug flag, API prefix
//! - [`StaticAssetsConfig`] - static file serving
//! - [`ServerConfig`] - HTTP server settings
//! - [`TelemetryConfigSection`] - logging and metrics
//!
//! The failure path does not read configuration directly: it receives an
//! immutable [`AppSettings`] derived from the `app` section.
//!
//! # Example
//!
//! ```no_run
//! use meridian_config::{AppSettings, ConfigLoader};
//!
//! # fn main() -> Result<(), meridian_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("meridian.toml")?
//!     .with_env()
//!     .load()?;
//!
//! let settings = AppSettings::from_config(&config.app);
//! println!("debug = {}", settings.debug());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [app]
//! project_root = "/srv/app"
//! environment = "production"
//! debug = false
//! api_prefix = "/api"
//!
//! [static_assets]
//! enabled = true
//! root = "public"
//! max_age_secs = 3600
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! max_body_bytes = 2097152
//!
//! [telemetry]
//! service_name = "my-service"
//!
//! [telemetry.logging]
//! level = "info"
//! json_format = true
//!
//! [telemetry.metrics]
//! enabled = true
//! endpoint = "/metrics"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `MERIDIAN__APP__DEBUG=true`
//! - `MERIDIAN__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `MERIDIAN__TELEMETRY__LOGGING__FORMAT=pretty`

#![doc(html_root_url = "https://docs.rs/meridian-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;
mod settings;

pub use config::{MeridianConfig, MeridianConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use meridian_telemetry::{LogConfig, MetricsConfig};
pub use schema::{AppConfig, ServerConfig, StaticAssetsConfig, TelemetryConfigSection};
pub use settings::AppSettings;
