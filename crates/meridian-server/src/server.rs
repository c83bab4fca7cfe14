//! HTTP server.
//!
//! # Architecture
//!
//! - TCP listener bound to the configured address
//! - one task per connection, served by hyper's HTTP/1.1 connection driver
//! - each request is collected, converted and handed to the [`Kernel`]
//! - shutdown stops accepting, lets open connections finish their current
//!   exchange and waits for them up to the shutdown timeout
//!
//! Response header maps go to the wire as-is, so a header with several
//! values (`Set-Cookie`, `Link`) is written as repeated lines.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use meridian_config::{MeridianConfig, ServerConfig};
use meridian_core::{Response, ResponseExt};
use meridian_middleware::stages::UNMATCHED_ROUTE;
use meridian_middleware::Kernel;
use meridian_telemetry::metrics::{record_request, render_metrics};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::transport::{collect_body, into_request, PeerInfo};

/// Content type of the Prometheus text format.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// The Meridian HTTP server.
///
/// ```rust,ignore
/// let server = Server::builder(kernel)
///     .http_addr("127.0.0.1:3000")
///     .shutdown_timeout(Duration::from_secs(5))
///     .build();
/// server.run().await?;
/// ```
pub struct Server {
    kernel: Arc<Kernel>,
    config: ServerConfig,
    metrics_endpoint: Option<String>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("metrics_endpoint", &self.metrics_endpoint)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server for `kernel` with the given settings and no
    /// metrics endpoint.
    #[must_use]
    pub fn new(kernel: Kernel, config: ServerConfig) -> Self {
        Self {
            kernel: Arc::new(kernel),
            config,
            metrics_endpoint: None,
        }
    }

    /// Creates a server from the full configuration.
    ///
    /// The metrics endpoint is exposed when metrics are enabled and an
    /// endpoint path is configured.
    #[must_use]
    pub fn from_config(kernel: Kernel, config: &MeridianConfig) -> Self {
        let metrics = &config.telemetry.metrics;
        let endpoint = metrics.endpoint.clone().filter(|_| metrics.enabled);
        Self::builder(kernel)
            .config(config.server.clone())
            .metrics_endpoint(endpoint)
            .build()
    }

    /// Starts building a server.
    #[must_use]
    pub fn builder(kernel: Kernel) -> ServerBuilder {
        ServerBuilder::new(kernel)
    }

    /// Returns the server settings.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the kernel requests are handed to.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Returns the metrics endpoint path, if exposed.
    #[must_use]
    pub fn metrics_endpoint(&self) -> Option<&str> {
        self.metrics_endpoint.as_deref()
    }

    /// Returns how long shutdown waits for open connections.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.config.shutdown_timeout_secs)
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.http_addr.as_str();
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Runs until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// is triggered, then drains.
    ///
    /// # Errors
    ///
    /// Fails when the listener's local address cannot be read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        info!(addr = %local, "Server listening");

        let shutdown_timeout = self.shutdown_timeout();
        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote)) => {
                            let server = Arc::clone(&server);
                            let guard = tracker.acquire();
                            let shutdown = shutdown.clone();
                            let peer = PeerInfo::new(remote, local);

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer, shutdown).await {
                                    debug!(remote = %remote, error = %e, "Connection error");
                                }
                                drop(guard);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        info!(
            timeout_secs = shutdown_timeout.as_secs(),
            active = tracker.active_connections(),
            "Draining connections"
        );

        tokio::select! {
            () = tracker.wait_idle() => {
                info!("All connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                warn!(
                    active = tracker.active_connections(),
                    "Shutdown timeout reached with connections still open"
                );
            }
        }

        info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        peer: PeerInfo,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, peer).await) }
        });

        let connection = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => result,
            () = shutdown.recv() => {
                debug!(remote = %peer.remote, "Finishing connection for shutdown");
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    }

    /// Handles one request on a connection.
    pub(crate) async fn handle_request(
        &self,
        request: http::Request<Incoming>,
        peer: PeerInfo,
    ) -> Response {
        if let Some(response) = self.metrics_response(request.method(), request.uri().path()) {
            return response;
        }

        let started = Instant::now();
        let (parts, body) = request.into_parts();
        let params = peer.server_params(&parts);

        match collect_body(body, self.config.max_body_bytes).await {
            Ok(body) => self.kernel.handle(into_request(parts, body, params)).await,
            Err(failure) => {
                warn!(
                    remote = %peer.remote,
                    path = %parts.uri.path(),
                    error = %failure,
                    "Rejected request body"
                );
                let request = into_request(parts, bytes::Bytes::new(), params);
                let response = self.kernel.render_failure(&failure, request);
                record_request(UNMATCHED_ROUTE, response.status().as_u16(), started.elapsed());
                response
            }
        }
    }

    /// Serves the Prometheus text when `path` is the metrics endpoint and a
    /// recorder is installed.
    fn metrics_response(&self, method: &Method, path: &str) -> Option<Response> {
        let endpoint = self.metrics_endpoint.as_deref()?;
        if method != Method::GET || path != endpoint {
            return None;
        }
        let body = render_metrics()?;
        let mut response = Response::text(StatusCode::OK, body);
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(METRICS_CONTENT_TYPE));
        Some(response)
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    kernel: Kernel,
    config: ServerConfig,
    metrics_endpoint: Option<String>,
}

impl ServerBuilder {
    /// Starts from the default server settings.
    #[must_use]
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            config: ServerConfig::default(),
            metrics_endpoint: None,
        }
    }

    /// Replaces all server settings.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Sets the drain timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the request body limit.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    /// Sets or clears the metrics endpoint path.
    #[must_use]
    pub fn metrics_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.metrics_endpoint = endpoint;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            kernel: Arc::new(self.kernel),
            config: self.config,
            metrics_endpoint: self.metrics_endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::RouteTable;

    fn kernel() -> Kernel {
        Kernel::builder(MeridianConfig::default())
            .router(RouteTable::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_overrides() {
        let server = Server::builder(kernel())
            .http_addr("127.0.0.1:3000")
            .shutdown_timeout(Duration::from_secs(5))
            .max_body_bytes(1024)
            .build();

        assert_eq!(server.config().http_addr, "127.0.0.1:3000");
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(server.config().max_body_bytes, 1024);
        assert_eq!(server.metrics_endpoint(), None);
    }

    #[test]
    fn test_from_config_exposes_metrics_endpoint() {
        let config = MeridianConfig::default();
        let server = Server::from_config(kernel(), &config);
        assert_eq!(server.metrics_endpoint(), config.telemetry.metrics.endpoint.as_deref());
        assert_eq!(server.config(), &config.server);
    }

    #[test]
    fn test_from_config_hides_metrics_when_disabled() {
        let mut config = MeridianConfig::default();
        config.telemetry.metrics.enabled = false;
        let server = Server::from_config(kernel(), &config);
        assert_eq!(server.metrics_endpoint(), None);
    }

    #[test]
    fn test_metrics_response_ignores_other_paths() {
        let server = Server::builder(kernel())
            .metrics_endpoint(Some("/metrics".to_string()))
            .build();
        assert!(server.metrics_response(&Method::GET, "/other").is_none());
        assert!(server.metrics_response(&Method::POST, "/metrics").is_none());
    }

    #[tokio::test]
    async fn test_bind_error_names_address() {
        let server = Server::builder(kernel()).http_addr("not an address").build();
        let err = server.bind().await.unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let server = Server::builder(kernel())
            .shutdown_timeout(Duration::from_secs(1))
            .build();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(2), server.serve(listener, shutdown))
            .await
            .expect("server should stop")
            .unwrap();
    }
}
