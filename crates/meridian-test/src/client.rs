//! In-memory test client.

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;
use bytes::Bytes;
use http::Method;
use meridian_core::Request;
use meridian_middleware::Kernel;
use serde::Serialize;
use std::sync::Arc;

/// Sends requests straight into a [`Kernel`], without a socket.
///
/// Requests run the full pipeline and failure boundary, so problem
/// responses look exactly as they would over HTTP.
///
/// ```ignore
/// let client = TestClient::new(kernel);
/// client
///     .get("/api/mustFail")
///     .send()
///     .await
///     .assert_status(StatusCode::NOT_FOUND)
///     .assert_json_field("instance", &json!("/api/mustFail"));
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    kernel: Arc<Kernel>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `kernel`.
    pub fn new(kernel: Kernel) -> Self {
        Self::shared(Arc::new(kernel))
    }

    /// Creates a client for a shared kernel.
    pub fn shared(kernel: Arc<Kernel>) -> Self {
        Self {
            kernel,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the kernel.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a HEAD request.
    pub fn head(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl Into<String>) -> TestClientRequest<'_> {
        let builder = self
            .default_headers
            .iter()
            .fold(TestRequestBuilder::new(method, uri), |builder, (name, value)| {
                builder.header(name.clone(), value.clone())
            });
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Sends an already built request.
    pub async fn send_request(&self, request: Request) -> TestResponse {
        TestResponse::from_response(self.kernel.handle(request).await)
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `Accept` header.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.builder = self.builder.accept(accept);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.cookie(name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a form body.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.form(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built; use [`try_send`](Self::try_send)
    /// to get the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("invalid test request: {e}"),
        }
    }

    /// Sends the request, returning build errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.send_request(request).await)
    }
}
