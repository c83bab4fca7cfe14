//! Response type and construction helpers.
//!
//! Responses are plain `http::Response<Full<Bytes>>` values. [`ResponseExt`]
//! adds the constructors and read helpers the pipeline needs. The status
//! class is always derived from the status code and never stored.

use crate::content_type::ContentType;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Collected, Full};

/// The HTTP response type produced by the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Classification of a status code by its first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
}

impl StatusClass {
    /// Derives the class of a status code.
    #[must_use]
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            400..=499 => Self::ClientError,
            _ => Self::ServerError,
        }
    }
}

/// Extension trait for building and inspecting responses.
pub trait ResponseExt: Sized {
    /// Creates a response with the given status, content type and body.
    fn with_content_type(status: StatusCode, content_type: ContentType, body: impl Into<Bytes>)
        -> Self;

    /// Creates a `text/plain` response.
    fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_content_type(status, ContentType::Plain, body.into())
    }

    /// Creates a `text/html` response.
    fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_content_type(status, ContentType::Html, body.into())
    }

    /// Creates an `application/json` response from an already built value.
    fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::with_content_type(status, ContentType::Json, body.to_string())
    }

    /// Creates a redirect to `location`.
    ///
    /// A location that is not a valid header value yields a response without
    /// a `Location` header.
    fn redirect(location: &str, status: StatusCode) -> Self;

    /// Creates a response with no body and no content type.
    fn empty(status: StatusCode) -> Self;

    /// Returns the status class.
    fn status_class(&self) -> StatusClass;

    /// Returns the canonical reason phrase of the status, if any.
    fn reason_phrase(&self) -> Option<&'static str>;

    /// Returns a copy of the body bytes.
    fn body_bytes(&self) -> Bytes;

    /// Returns a copy with the same status, version, headers and body.
    ///
    /// Extensions are not copied.
    fn duplicate(&self) -> Self;
}

impl ResponseExt for Response {
    fn with_content_type(
        status: StatusCode,
        content_type: ContentType,
        body: impl Into<Bytes>,
    ) -> Self {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        if let Ok(value) = HeaderValue::from_str(&content_type.header_value()) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }

    fn redirect(location: &str, status: StatusCode) -> Self {
        let mut response = Self::empty(status);
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers_mut().insert(LOCATION, value);
        }
        response
    }

    fn empty(status: StatusCode) -> Self {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status())
    }

    fn reason_phrase(&self) -> Option<&'static str> {
        self.status().canonical_reason()
    }

    fn body_bytes(&self) -> Bytes {
        full_bytes(self.body())
    }

    fn duplicate(&self) -> Self {
        let mut copy = http::Response::new(Full::new(self.body_bytes()));
        *copy.status_mut() = self.status();
        *copy.version_mut() = self.version();
        *copy.headers_mut() = self.headers().clone();
        copy
    }
}

/// Reads the bytes of a `Full` body without consuming it.
///
/// A `Full` body yields its data in a single, immediately ready frame.
fn full_bytes(body: &Full<Bytes>) -> Bytes {
    body.clone()
        .collect()
        .now_or_never()
        .and_then(Result::ok)
        .map(Collected::to_bytes)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let response = Response::text(StatusCode::OK, "hello");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.body_bytes(), Bytes::from("hello"));
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::CREATED, &serde_json::json!({"id": 1}));
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.body_bytes(), Bytes::from(r#"{"id":1}"#));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/login", StatusCode::FOUND);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        assert_eq!(response.status_class(), StatusClass::Redirect);
    }

    #[test]
    fn test_empty_has_no_content_type() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(response.body_bytes().is_empty());
    }

    #[test]
    fn test_status_class_derived() {
        assert_eq!(StatusClass::of(StatusCode::CONTINUE), StatusClass::Informational);
        assert_eq!(StatusClass::of(StatusCode::OK), StatusClass::Success);
        assert_eq!(StatusClass::of(StatusCode::NOT_FOUND), StatusClass::ClientError);
        assert_eq!(StatusClass::of(StatusCode::BAD_GATEWAY), StatusClass::ServerError);
    }

    #[test]
    fn test_reason_phrase() {
        let response = Response::empty(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.reason_phrase(), Some("Too Many Requests"));
    }

    #[test]
    fn test_duplicate_preserves_headers_and_body() {
        let mut response = Response::html(StatusCode::ACCEPTED, "<p>ok</p>");
        response
            .headers_mut()
            .append("x-tag", HeaderValue::from_static("a"));
        response
            .headers_mut()
            .append("x-tag", HeaderValue::from_static("b"));

        let copy = response.duplicate();
        assert_eq!(copy.status(), StatusCode::ACCEPTED);
        assert_eq!(copy.headers().get_all("x-tag").iter().count(), 2);
        assert_eq!(copy.body_bytes(), response.body_bytes());
    }
}
