//! Errors raised while assembling a [`MeridianConfig`](crate::MeridianConfig).

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a configuration source came from, for error messages.
const INLINE_SOURCE: &str = "inline configuration";

/// A configuration source could not be turned into a valid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("no configuration file at {}", path.display())]
    MissingFile {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML or a field the schema does not know.
    #[error("malformed TOML in {origin}: {source}")]
    Toml {
        /// File path or inline marker.
        origin: String,
        /// Parser failure.
        #[source]
        source: toml::de::Error,
    },

    /// Malformed JSON or a field the schema does not know.
    #[error("malformed JSON in {origin}: {source}")]
    Json {
        /// File path or inline marker.
        origin: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },

    /// Neither `toml` nor `json`.
    #[error("unsupported configuration format '{0}', expected toml or json")]
    UnsupportedFormat(String),

    /// A `.env` file exists but does not parse.
    #[error("invalid dotenv file {origin}")]
    Dotenv {
        /// File path, or `.env` when searched for.
        origin: String,
        /// Parser failure.
        #[source]
        source: dotenvy::Error,
    },

    /// A `MERIDIAN__...` override holds a value of the wrong shape.
    #[error("environment override {var} is invalid: expected {expected}")]
    EnvOverride {
        /// Variable name.
        var: String,
        /// Accepted shape, e.g. `integer`.
        expected: &'static str,
    },

    /// The assembled configuration breaks a rule checked by `validate`.
    #[error("{field} {reason}")]
    Invalid {
        /// Dotted field path, e.g. `server.http_addr`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn missing_file(path: &Path) -> Self {
        Self::MissingFile {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn unreadable(path: &Path, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn toml(path: Option<&Path>, source: toml::de::Error) -> Self {
        Self::Toml {
            origin: origin(path),
            source,
        }
    }

    pub(crate) fn json(path: Option<&Path>, source: serde_json::Error) -> Self {
        Self::Json {
            origin: origin(path),
            source,
        }
    }

    pub(crate) fn dotenv(origin: impl Into<String>, source: dotenvy::Error) -> Self {
        Self::Dotenv {
            origin: origin.into(),
            source,
        }
    }

    pub(crate) fn env_override(var: impl Into<String>, expected: &'static str) -> Self {
        Self::EnvOverride {
            var: var.into(),
            expected,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

fn origin(path: Option<&Path>) -> String {
    path.map_or_else(|| INLINE_SOURCE.to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_missing_file_names_path() {
        let err = ConfigError::missing_file(Path::new("/etc/meridian/meridian.toml"));
        assert_eq!(err.to_string(), "no configuration file at /etc/meridian/meridian.toml");
    }

    #[test]
    fn test_toml_origin() {
        let malformed = || toml::from_str::<toml::Value>("app = [").unwrap_err();
        let inline = ConfigError::toml(None, malformed());
        assert!(inline.to_string().starts_with("malformed TOML in inline configuration"));

        let from_file = ConfigError::toml(Some(Path::new("meridian.toml")), malformed());
        assert!(from_file.to_string().starts_with("malformed TOML in meridian.toml"));
        assert!(from_file.source().is_some());
    }

    #[test]
    fn test_env_override_message() {
        let err = ConfigError::env_override("MERIDIAN__APP__DEBUG", "boolean");
        assert_eq!(
            err.to_string(),
            "environment override MERIDIAN__APP__DEBUG is invalid: expected boolean"
        );
    }

    #[test]
    fn test_invalid_field() {
        let err = ConfigError::invalid("server.max_body_bytes", "must be greater than zero");
        assert_eq!(err.to_string(), "server.max_body_bytes must be greater than zero");
    }

    #[test]
    fn test_unreadable_keeps_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::unreadable(Path::new("/etc/meridian.toml"), io);
        assert_eq!(err.source().unwrap().to_string(), "denied");
    }
}
