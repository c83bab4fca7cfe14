//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::Method;
use meridian_core::{Request, ServerParams};
use serde::Serialize;

/// Address test requests appear to come from.
pub const TEST_REMOTE_ADDR: &str = "127.0.0.1";

/// Builder for [`Request`] values sent through a test client.
///
/// Requests get the server parameters a local HTTP/1.1 client would have.
///
/// ```
/// use meridian_test::TestRequestBuilder;
///
/// let request = TestRequestBuilder::get("/search?q=rust")
///     .accept("application/json")
///     .build()
///     .unwrap();
/// assert_eq!(request.path(), "/search");
/// ```
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Bytes,
    server_params: Vec<(String, String)>,
    pending_error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            server_params: Vec::new(),
            pending_error: None,
        }
    }

    /// Creates a GET builder.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a POST builder.
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Appends a header; repeated names keep every value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `Accept` header.
    pub fn accept(self, accept: impl Into<String>) -> Self {
        self.header(ACCEPT.as_str(), accept)
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Adds a cookie; all cookies go into one `Cookie` header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Overrides a server parameter such as `REMOTE_ADDR`.
    pub fn server_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_params.push((key.into(), value.into()));
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Bytes::from(bytes),
            Err(e) => self.pending_error = Some(e.into()),
        }
        self.content_type("application/json")
    }

    /// Sets a form body and `Content-Type: application/x-www-form-urlencoded`.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => self.body = Bytes::from(encoded),
            Err(e) => self.pending_error = Some(e.into()),
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URI or header, or when a JSON or form body
    /// could not be encoded.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(error) = self.pending_error {
            return Err(error);
        }

        let host = self
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map_or("localhost", |(_, value)| value.as_str())
            .to_string();

        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .body(self.body)
            .server_param(ServerParams::REMOTE_ADDR, TEST_REMOTE_ADDR)
            .server_param(ServerParams::REMOTE_PORT, "0")
            .server_param(ServerParams::SERVER_PROTOCOL, "HTTP/1.1")
            .server_param(ServerParams::SERVER_NAME, host)
            .server_param(ServerParams::REQUEST_TIME, "0");

        for (key, value) in self.server_params {
            builder = builder.server_param(key, value);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE.as_str(), cookie);
        }

        Ok(builder.build()?)
    }
}
