//! Errors raised while building or reading a [`Request`](crate::Request).

use thiserror::Error;

/// Errors from request construction and typed accessors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A custom attribute key is not namespaced.
    #[error("attribute key '{0}' must be namespaced as 'namespace.name'")]
    InvalidAttributeKey(String),

    /// The request target could not be parsed.
    #[error("invalid request URI '{uri}': {reason}")]
    InvalidUri {
        /// The rejected URI.
        uri: String,
        /// Parser message.
        reason: String,
    },

    /// A header name or value is not valid HTTP.
    #[error("invalid header '{name}'")]
    InvalidHeader {
        /// The rejected header name.
        name: String,
    },

    /// The body could not be deserialized as JSON into the requested type.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RequestError::InvalidAttributeKey("route".into());
        assert!(err.to_string().contains("namespace.name"));

        let err = RequestError::InvalidHeader {
            name: "bad header".into(),
        };
        assert_eq!(err.to_string(), "invalid header 'bad header'");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RequestError = json_err.into();
        assert!(matches!(err, RequestError::InvalidJson(_)));
    }
}
