//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use meridian_core::{Response, ResponseExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A collected response with assertion helpers.
///
/// Assertions return `&Self` so they chain:
///
/// ```ignore
/// response
///     .assert_status(StatusCode::NOT_FOUND)
///     .assert_header("content-type", "application/json")
///     .assert_json_field("title", &json!("Not Found"));
/// ```
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Creates a response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Wraps a kernel response.
    #[must_use]
    pub fn from_response(response: Response) -> Self {
        let body = response.body_bytes();
        let (parts, _) = response.into_parts();
        Self::new(parts.status, parts.headers, body)
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of a header.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Returns the first value of a header as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every value of a header.
    #[must_use]
    pub fn header_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.headers
            .get_all(name.as_ref())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Returns the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Asserts the status.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header is present with exactly this value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));
        assert_eq!(
            actual, expected,
            "Header '{}': expected '{}', got '{}'",
            name, expected, actual
        );
        self
    }

    /// Asserts that a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        assert!(
            self.header(name).is_none(),
            "Header '{}' should be absent, got {:?}",
            name,
            self.header(name)
        );
        self
    }

    /// Asserts that the `Content-Type` starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_content_type(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let actual = self
            .content_type()
            .unwrap_or_else(|| panic!("Content-Type header not found"));
        assert!(
            actual.starts_with(expected),
            "Content-Type: expected '{}', got '{}'",
            expected,
            actual
        );
        self
    }

    /// Asserts that the body contains a substring.
    ///
    /// # Panics
    ///
    /// Panics if the body is not UTF-8 or lacks the substring.
    pub fn assert_body_contains(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let body = self
            .text()
            .unwrap_or_else(|e| panic!("Body should be valid UTF-8: {e}"));
        assert!(
            body.contains(expected),
            "Body should contain '{}', got: {}",
            expected,
            body
        );
        self
    }

    /// Asserts that the body does not contain a substring.
    ///
    /// # Panics
    ///
    /// Panics if the body contains the substring.
    pub fn assert_body_lacks(&self, unexpected: impl AsRef<str>) -> &Self {
        let unexpected = unexpected.as_ref();
        let body = String::from_utf8_lossy(&self.body);
        assert!(
            !body.contains(unexpected),
            "Body should not contain '{}', got: {}",
            unexpected,
            body
        );
        self
    }

    /// Asserts that the body is empty.
    ///
    /// # Panics
    ///
    /// Panics if the body is not empty.
    pub fn assert_empty_body(&self) -> &Self {
        assert!(
            self.body.is_empty(),
            "Body should be empty, got {} bytes",
            self.body.len()
        );
        self
    }

    /// Asserts a JSON field, addressed by a dotted path such as
    /// `extensions.throwable.type` or `items.0.name`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON, the path is missing, or the value
    /// differs.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &Value) -> &Self {
        let path = path.as_ref();
        let json = self
            .json_value()
            .unwrap_or_else(|e| panic!("Body should be valid JSON: {e}"));
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{}' not found in: {}", path, json));
        assert_eq!(
            actual, expected,
            "JSON field '{}': expected {}, got {}",
            path, expected, actual
        );
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Looks up a dotted path; numeric segments index arrays.
fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match segment.parse::<usize>() {
            Ok(index) if current.is_array() => current.get(index),
            _ => current.get(segment),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        TestResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_from_response() {
        let kernel_response = Response::text(StatusCode::CREATED, "made");
        let response = TestResponse::from_response(kernel_response);
        response
            .assert_status(StatusCode::CREATED)
            .assert_body_contains("made")
            .assert_content_type("text/plain");
    }

    #[test]
    fn test_header_all() {
        let response = response(200, "{}");
        assert_eq!(response.header_all("set-cookie"), ["a=1", "b=2"]);
        response.assert_no_header("etag");
    }

    #[test]
    fn test_json() {
        let response = response(200, r#"{"name":"Alice","age":30}"#);
        let value = response.json_value().unwrap();
        assert_eq!(value["name"], "Alice");
        assert_eq!(value["age"], 30);
    }

    #[test]
    fn test_assert_json_field() {
        let response = response(200, r#"{"user":{"tags":["admin"]},"extensions":{"debug":false}}"#);
        response
            .assert_json_field("user.tags.0", &json!("admin"))
            .assert_json_field("extensions.debug", &json!(false));
    }

    #[test]
    #[should_panic(expected = "Expected status")]
    fn test_assert_status_panics() {
        response(404, "{}").assert_status(StatusCode::OK);
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn test_assert_json_field_missing() {
        response(200, "{}").assert_json_field("missing", &json!(1));
    }

    #[test]
    fn test_json_path() {
        let value = json!({"items": [{"name": "a"}], "0": "zero"});
        assert_eq!(json_path(&value, "items.0.name"), Some(&json!("a")));
        assert_eq!(json_path(&value, "0"), Some(&json!("zero")));
        assert_eq!(json_path(&value, "items.5"), None);
    }

    #[test]
    fn test_empty_body() {
        response(304, "").assert_empty_body().assert_body_lacks("x");
    }
}
