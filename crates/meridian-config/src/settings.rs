//! Immutable runtime settings derived from configuration.

use crate::AppConfig;
use std::path::{Path, PathBuf};

/// Read-only application settings shared by the failure path.
///
/// Built once from [`AppConfig`] and shared behind an `Arc`.
///
/// # Example
///
/// ```
/// use meridian_config::{AppConfig, AppSettings};
///
/// let settings = AppSettings::from_config(&AppConfig {
///     project_root: "/srv/app".into(),
///     environment: "dev".to_string(),
///     debug: true,
///     ..Default::default()
/// });
///
/// assert!(settings.debug());
/// assert!(!settings.redact_arguments());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    project_root: PathBuf,
    environment: String,
    debug: bool,
    redact_arguments: bool,
}

impl AppSettings {
    /// Creates settings directly.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, environment: impl Into<String>, debug: bool) -> Self {
        Self {
            project_root: project_root.into(),
            environment: environment.into(),
            debug,
            redact_arguments: !debug,
        }
    }

    /// Derives settings from the application section.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            project_root: config.project_root.clone(),
            environment: config.environment.clone(),
            debug: config.debug,
            redact_arguments: config.redact_arguments.unwrap_or(!config.debug),
        }
    }

    /// Overrides argument redaction.
    #[must_use]
    pub fn with_redact_arguments(mut self, redact: bool) -> Self {
        self.redact_arguments = redact;
        self
    }

    /// Returns the project root replaced in diagnostic paths.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns whether debug details are exposed.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns whether frame arguments are redacted.
    #[must_use]
    pub fn redact_arguments(&self) -> bool {
        self.redact_arguments
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl From<&AppConfig> for AppSettings {
    fn from(config: &AppConfig) -> Self {
        Self::from_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_follows_debug() {
        assert!(AppSettings::new("", "prod", false).redact_arguments());
        assert!(!AppSettings::new("", "dev", true).redact_arguments());
    }

    #[test]
    fn test_explicit_redaction_wins() {
        let settings = AppSettings::from_config(&AppConfig {
            debug: true,
            redact_arguments: Some(true),
            ..Default::default()
        });
        assert!(settings.debug());
        assert!(settings.redact_arguments());
    }

    #[test]
    fn test_default_is_production() {
        let settings = AppSettings::default();
        assert_eq!(settings.environment(), "production");
        assert!(!settings.debug());
        assert!(settings.project_root().as_os_str().is_empty());
    }
}
