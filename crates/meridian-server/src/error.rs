//! Server errors.

use std::io;
use thiserror::Error;

/// Errors that stop the server.
///
/// Per-request problems never surface here; the kernel renders those.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The configured address.
        addr: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::bind(
            "127.0.0.1:80",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert_eq!(
            err.to_string(),
            "failed to bind to 127.0.0.1:80: permission denied"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_from() {
        let err: ServerError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
