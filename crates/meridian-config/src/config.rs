//! Main configuration types.
//!
//! This module provides the top-level [`MeridianConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{AppConfig, ConfigError, ServerConfig, StaticAssetsConfig, TelemetryConfigSection};

/// Complete Meridian configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use meridian_config::MeridianConfig;
///
/// let config = MeridianConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(!config.app.debug);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MeridianConfig {
    /// Application settings (environment, debug, project root).
    #[serde(default)]
    pub app: AppConfig,

    /// Static asset serving.
    #[serde(default)]
    pub static_assets: StaticAssetsConfig,

    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl MeridianConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use meridian_config::{AppConfig, MeridianConfig};
    ///
    /// let config = MeridianConfig::builder()
    ///     .app(AppConfig {
    ///         environment: "staging".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.app.environment, "staging");
    /// ```
    #[must_use]
    pub fn builder() -> MeridianConfigBuilder {
        MeridianConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - the server address is not a socket address
    /// - the API prefix is non-empty and does not start with `/`
    /// - the environment name is empty
    /// - the body limit is zero
    /// - static assets are enabled with an empty root
    /// - the metrics endpoint does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid(
                "server.http_addr",
                format!("is not a socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if !self.app.api_prefix.is_empty() && !self.app.api_prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "app.api_prefix",
                format!("must start with '/': {}", self.app.api_prefix),
            ));
        }

        if self.app.environment.trim().is_empty() {
            return Err(ConfigError::invalid(
                "app.environment",
                "must not be empty",
            ));
        }

        if self.static_assets.enabled && self.static_assets.root.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "static_assets.root",
                "must be set when static assets are enabled",
            ));
        }

        if let Some(endpoint) = &self.telemetry.metrics.endpoint {
            if !endpoint.starts_with('/') {
                return Err(ConfigError::invalid(
                    "telemetry.metrics.endpoint",
                    format!("must start with '/': {endpoint}"),
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Debug problem documents with raw frame arguments
    /// - Pretty log formatting at debug level
    /// - Environment "development"
    ///
    /// # Example
    ///
    /// ```
    /// use meridian_config::MeridianConfig;
    ///
    /// let config = MeridianConfig::development();
    /// assert!(config.app.debug);
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.app.environment = "development".to_string();
        config.app.debug = true;

        config.telemetry.logging = meridian_telemetry::LogConfig::development();

        config
    }

    /// Create a production configuration preset.
    ///
    /// - No failure details in problem documents
    /// - JSON log formatting at info level
    /// - Environment "production"
    ///
    /// # Example
    ///
    /// ```
    /// use meridian_config::MeridianConfig;
    ///
    /// let config = MeridianConfig::production();
    /// assert!(!config.app.debug);
    /// assert!(config.telemetry.logging.json_format);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.app.environment = "production".to_string();
        config.app.debug = false;
        config.app.redact_arguments = Some(true);

        config.telemetry.logging = meridian_telemetry::LogConfig::production();

        config
    }
}

/// Builder for [`MeridianConfig`].
#[derive(Debug, Default)]
pub struct MeridianConfigBuilder {
    app: Option<AppConfig>,
    static_assets: Option<StaticAssetsConfig>,
    server: Option<ServerConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl MeridianConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application configuration.
    #[must_use]
    pub fn app(mut self, app: AppConfig) -> Self {
        self.app = Some(app);
        self
    }

    /// Set the static asset configuration.
    #[must_use]
    pub fn static_assets(mut self, static_assets: StaticAssetsConfig) -> Self {
        self.static_assets = Some(static_assets);
        self
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> MeridianConfig {
        MeridianConfig {
            app: self.app.unwrap_or_default(),
            static_assets: self.static_assets.unwrap_or_default(),
            server: self.server.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<MeridianConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
