//! The request value object.
//!
//! A [`Request`] is immutable per step: every `with_*` method consumes the
//! value and returns an updated one. Sub-parts are `Arc`-shared, so cloning
//! is cheap and an earlier snapshot stays valid after later stages have
//! produced new versions. The kernel keeps such a snapshot to describe the
//! request in problem documents.
//!
//! # Example
//!
//! ```
//! use meridian_core::{ParamBag, Request};
//!
//! let request = Request::builder()
//!     .uri("/search?q=rust")
//!     .header("Accept", "application/json")
//!     .build()
//!     .unwrap();
//!
//! let adapted = request
//!     .clone()
//!     .with_query_params(ParamBag::from_pairs([("q", "rust")]));
//!
//! assert_eq!(adapted.query("q"), Some("rust"));
//! assert_eq!(request.query("q"), None);
//! ```

use crate::attributes::{AttributeKey, AttributeValue, Attributes};
use crate::context::RequestContext;
use crate::error::RequestError;
use crate::files::{UploadedFile, UploadedFiles};
use crate::normalize::HandlerValue;
use crate::params::{ParamBag, ServerParams};
use crate::routing::RouteMatch;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Header set by browser libraries on script-initiated requests.
pub const X_REQUESTED_WITH: &str = "x-requested-with";

#[derive(Debug, Clone)]
struct Head {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
}

/// An inbound HTTP request with parsed parts and attributes.
#[derive(Debug, Clone)]
pub struct Request {
    head: Arc<Head>,
    body: Bytes,
    server: Arc<ServerParams>,
    query: Arc<ParamBag>,
    parsed_body: Option<Arc<Value>>,
    files: Arc<UploadedFiles>,
    cookies: Arc<BTreeMap<String, String>>,
    attributes: Arc<Attributes>,
}

impl Request {
    /// Starts building a request; defaults to `GET /`.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Wraps a collected `http` request.
    ///
    /// Query, cookies and body are left unparsed; the adapter stage fills
    /// them in.
    #[must_use]
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(
            parts.method,
            parts.uri,
            parts.version,
            parts.headers,
            body,
            ServerParams::new(),
        )
    }

    fn from_parts(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderMap,
        body: Bytes,
        server: ServerParams,
    ) -> Self {
        Self {
            head: Arc::new(Head {
                method,
                uri,
                version,
                headers,
            }),
            body,
            server: Arc::new(server),
            query: Arc::default(),
            parsed_body: None,
            files: Arc::default(),
            cookies: Arc::default(),
            attributes: Arc::default(),
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the request target.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns the protocol version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the first value of a header, if it is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every textual value of a header.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.head
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Returns `true` if the header is present.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.head.headers.contains_key(name)
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns a server parameter such as `REMOTE_ADDR`.
    #[must_use]
    pub fn server_param(&self, key: &str) -> Option<&str> {
        self.server.get(key)
    }

    /// Returns all server parameters.
    #[must_use]
    pub fn server_params(&self) -> &ServerParams {
        &self.server
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key)
    }

    /// Returns a query parameter or `default`.
    #[must_use]
    pub fn query_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query(key).unwrap_or(default)
    }

    /// Returns every value of a query parameter.
    #[must_use]
    pub fn query_all(&self, key: &str) -> &[String] {
        self.query.get_all(key)
    }

    /// Returns all query parameters.
    #[must_use]
    pub fn query_params(&self) -> &ParamBag {
        &self.query
    }

    /// Returns a field of the parsed body.
    #[must_use]
    pub fn post(&self, key: &str) -> Option<&Value> {
        self.parsed_body.as_deref().and_then(|body| body.get(key))
    }

    /// Returns a field of the parsed body or `default`.
    #[must_use]
    pub fn post_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.post(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Returns the parsed body, if the adapter could parse one.
    #[must_use]
    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed_body.as_deref()
    }

    /// Deserializes the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns an uploaded file by field path, e.g. `docs[0]`.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&UploadedFile> {
        self.files.get(path)
    }

    /// Returns all uploaded files.
    #[must_use]
    pub fn files(&self) -> &UploadedFiles {
        &self.files
    }

    /// Returns a cookie value.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns all cookies.
    #[must_use]
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Returns `true` for `X-Requested-With: XMLHttpRequest`.
    #[must_use]
    pub fn is_xhr(&self) -> bool {
        self.header(X_REQUESTED_WITH)
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// Returns an attribute.
    #[must_use]
    pub fn attribute(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns the route match stored by the routing stage.
    #[must_use]
    pub fn route(&self) -> Option<&RouteMatch> {
        match self.attribute(&AttributeKey::Route) {
            Some(AttributeValue::Route(route)) => Some(route),
            _ => None,
        }
    }

    /// Returns the handler result stored by the dispatch stage.
    #[must_use]
    pub fn handler_result(&self) -> Option<&Arc<HandlerValue>> {
        match self.attribute(&AttributeKey::HandlerResult) {
            Some(AttributeValue::HandlerResult(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the context stored by the context stage.
    #[must_use]
    pub fn context(&self) -> Option<&RequestContext> {
        match self.attribute(&AttributeKey::Context) {
            Some(AttributeValue::Context(ctx)) => Some(ctx),
            _ => None,
        }
    }

    /// Returns a copy with a header value appended.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        Arc::make_mut(&mut self.head).headers.append(name, value);
        self
    }

    /// Returns a copy with the given query parameters.
    #[must_use]
    pub fn with_query_params(mut self, query: ParamBag) -> Self {
        self.query = Arc::new(query);
        self
    }

    /// Returns a copy with the given parsed body.
    #[must_use]
    pub fn with_parsed_body(mut self, body: Option<Value>) -> Self {
        self.parsed_body = body.map(Arc::new);
        self
    }

    /// Returns a copy with the given uploaded files.
    #[must_use]
    pub fn with_uploaded_files(mut self, files: UploadedFiles) -> Self {
        self.files = Arc::new(files);
        self
    }

    /// Returns a copy with the given cookies.
    #[must_use]
    pub fn with_cookies(mut self, cookies: BTreeMap<String, String>) -> Self {
        self.cookies = Arc::new(cookies);
        self
    }

    /// Returns a copy with the given server parameters.
    #[must_use]
    pub fn with_server_params(mut self, params: ServerParams) -> Self {
        self.server = Arc::new(params);
        self
    }

    /// Returns a copy with an attribute set.
    #[must_use]
    pub fn with_attribute(mut self, key: AttributeKey, value: AttributeValue) -> Self {
        Arc::make_mut(&mut self.attributes).insert(key, value);
        self
    }

    /// Returns a copy with an attribute removed.
    #[must_use]
    pub fn without_attribute(mut self, key: &AttributeKey) -> Self {
        if self.attributes.get(key).is_some() {
            Arc::make_mut(&mut self.attributes).remove(key);
        }
        self
    }
}

/// Builder for [`Request`] values, used by the transport and by tests.
#[must_use]
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    version: Version,
    headers: Vec<(String, String)>,
    body: Bytes,
    server: ServerParams,
}

impl RequestBuilder {
    fn new() -> Self {
        Self {
            method: Method::GET,
            uri: "/".to_string(),
            version: Version::HTTP_11,
            headers: Vec::new(),
            body: Bytes::new(),
            server: ServerParams::new(),
        }
    }

    /// Sets the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request target.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets the protocol version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Appends a header; repeated names keep every value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a server parameter.
    pub fn server_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(key, value);
        self
    }

    /// Validates the URI and headers and builds the request.
    pub fn build(self) -> Result<Request, RequestError> {
        let uri: Uri = self.uri.parse().map_err(|e: http::uri::InvalidUri| {
            RequestError::InvalidUri {
                uri: self.uri.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let invalid = || RequestError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::try_from(name.as_str()).map_err(|_| invalid())?;
            let header_value = HeaderValue::try_from(value.as_str()).map_err(|_| invalid())?;
            headers.append(header_name, header_value);
        }

        Ok(Request::from_parts(
            self.method,
            uri,
            self.version,
            headers,
            self.body,
            self.server,
        ))
    }
}
