//! Response normalization.
//!
//! Handlers may return a finished response or a bare value. The
//! [`ResponseNormalizer`] turns whatever came back into a response in the
//! negotiated format:
//!
//! - a finished response only gains a `Content-Type` if it has none;
//! - for JSON, the value is serialized, and a serialization failure degrades
//!   to a `text/plain` body instead of failing the request;
//! - for other formats, the value is rendered as text under that format's
//!   content type;
//! - [`HandlerValue::Empty`] becomes `204 No Content`.

use crate::content_type::ContentType;
use crate::negotiation::ContentNegotiator;
use crate::request::Request;
use crate::response::{Response, ResponseExt};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// A value could not be serialized into JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response serialization failed: {message}")]
pub struct SerializationFailure {
    message: String,
}

impl SerializationFailure {
    /// Creates a serialization failure with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What a handler returned.
#[derive(Debug)]
pub enum HandlerValue {
    /// A finished response.
    Response(Response),
    /// A JSON value.
    Json(Value),
    /// A structured value serialized eagerly; see [`HandlerValue::structured`].
    Structured(Result<Value, SerializationFailure>),
    /// Plain text.
    Text(String),
    /// Nothing.
    Empty,
}

impl HandlerValue {
    /// Serializes any value now, keeping a failure for the normalizer.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::Structured(
            serde_json::to_value(value).map_err(|e| SerializationFailure::new(e.to_string())),
        )
    }

    /// Returns a short name of the variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Response(_) => "response",
            Self::Json(_) => "json",
            Self::Structured(_) => "structured",
            Self::Text(_) => "text",
            Self::Empty => "empty",
        }
    }
}

impl Clone for HandlerValue {
    fn clone(&self) -> Self {
        match self {
            Self::Response(response) => Self::Response(response.duplicate()),
            Self::Json(value) => Self::Json(value.clone()),
            Self::Structured(result) => Self::Structured(result.clone()),
            Self::Text(text) => Self::Text(text.clone()),
            Self::Empty => Self::Empty,
        }
    }
}

impl From<Response> for HandlerValue {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for HandlerValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for HandlerValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HandlerValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<()> for HandlerValue {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// Coerces handler values into responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    negotiator: ContentNegotiator,
}

impl ResponseNormalizer {
    /// Creates a normalizer using the given negotiator.
    #[must_use]
    pub fn new(negotiator: ContentNegotiator) -> Self {
        Self { negotiator }
    }

    /// Returns the negotiator.
    #[must_use]
    pub fn negotiator(&self) -> &ContentNegotiator {
        &self.negotiator
    }

    /// Normalizes a value into the format the request prefers.
    #[must_use]
    pub fn normalize(&self, request: &Request, value: HandlerValue) -> Response {
        self.normalize_as(self.negotiator.resolve(request), value)
    }

    /// Normalizes a value into an explicit format.
    #[must_use]
    pub fn normalize_as(&self, format: ContentType, value: HandlerValue) -> Response {
        match value {
            HandlerValue::Response(mut response) => {
                if !response.headers().contains_key(CONTENT_TYPE) {
                    if let Ok(header) = HeaderValue::from_str(&format.header_value()) {
                        response.headers_mut().insert(CONTENT_TYPE, header);
                    }
                }
                response
            }
            HandlerValue::Empty => Response::empty(StatusCode::NO_CONTENT),
            value if format == ContentType::Json => json_response(value),
            value => Response::with_content_type(StatusCode::OK, format, render_text(value)),
        }
    }
}

fn json_response(value: HandlerValue) -> Response {
    let serialized = match value {
        HandlerValue::Json(json) | HandlerValue::Structured(Ok(json)) => {
            serde_json::to_vec(&json).map_err(|e| SerializationFailure::new(e.to_string()))
        }
        HandlerValue::Text(text) => {
            serde_json::to_vec(&text).map_err(|e| SerializationFailure::new(e.to_string()))
        }
        HandlerValue::Structured(Err(failure)) => Err(failure),
        HandlerValue::Response(_) | HandlerValue::Empty => Ok(Vec::new()),
    };

    match serialized {
        Ok(body) => Response::with_content_type(StatusCode::OK, ContentType::Json, body),
        Err(failure) => {
            warn!(error = %failure, "Falling back to plain text for unserializable handler value");
            Response::text(StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
        }
    }
}

fn render_text(value: HandlerValue) -> String {
    match value {
        HandlerValue::Text(text) => text,
        HandlerValue::Json(json) | HandlerValue::Structured(Ok(json)) => match json {
            Value::String(text) => text,
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        },
        HandlerValue::Structured(Err(failure)) => failure.to_string(),
        HandlerValue::Response(_) | HandlerValue::Empty => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde::ser::Error as _;
    use serde::Serializer;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cyclic reference"))
        }
    }

    fn api_request() -> Request {
        Request::builder().uri("/api/items").build().unwrap()
    }

    fn page_request() -> Request {
        Request::builder().uri("/items").build().unwrap()
    }

    #[test]
    fn test_response_keeps_existing_content_type() {
        let normalizer = ResponseNormalizer::default();
        let original = Response::with_content_type(StatusCode::OK, ContentType::Csv, "a,b");
        let response = normalizer.normalize(&api_request(), original.into());
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );

        let again = normalizer.normalize(&api_request(), response.into());
        assert_eq!(
            again.headers().get(CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        assert_eq!(again.body_bytes(), Bytes::from("a,b"));
    }

    #[test]
    fn test_response_gains_negotiated_content_type() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.normalize(
            &api_request(),
            Response::empty(StatusCode::ACCEPTED).into(),
        );
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_json_value() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.normalize(&api_request(), serde_json::json!({"ok": true}).into());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_bytes(), Bytes::from(r#"{"ok":true}"#));
    }

    #[test]
    fn test_structured_serialization_failure_degrades() {
        let normalizer = ResponseNormalizer::default();
        let value = HandlerValue::structured(&Unserializable);
        let response = normalizer.normalize(&api_request(), value);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        let body = String::from_utf8(response.body_bytes().to_vec()).unwrap();
        assert!(body.contains("cyclic reference"));
    }

    #[test]
    fn test_html_renders_text() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.normalize(&page_request(), "<h1>Hi</h1>".into());
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(response.body_bytes(), Bytes::from("<h1>Hi</h1>"));
    }

    #[test]
    fn test_json_value_as_text_is_pretty() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.normalize_as(ContentType::Plain, serde_json::json!({"a": 1}).into());
        assert_eq!(response.body_bytes(), Bytes::from("{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_empty_is_no_content() {
        let normalizer = ResponseNormalizer::default();
        let response = normalizer.normalize(&api_request(), ().into());
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body_bytes().is_empty());
    }

    #[test]
    fn test_clone_duplicates_response() {
        let value = HandlerValue::Response(Response::text(StatusCode::OK, "x"));
        let copy = value.clone();
        assert_eq!(copy.kind(), "response");
        if let HandlerValue::Response(response) = copy {
            assert_eq!(response.body_bytes(), Bytes::from("x"));
        }
    }
}
