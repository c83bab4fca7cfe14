//! Conversion between hyper exchanges and Meridian requests.

use bytes::Bytes;
use http::header::HOST;
use http::request::Parts;
use http::Version;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use meridian_core::{Failure, HttpProblem, Request, ServerParams};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// The two ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    /// Client address.
    pub remote: SocketAddr,
    /// Address the connection was accepted on.
    pub local: SocketAddr,
}

impl PeerInfo {
    /// Creates peer info.
    #[must_use]
    pub const fn new(remote: SocketAddr, local: SocketAddr) -> Self {
        Self { remote, local }
    }

    /// Builds the server parameters for a request received on this
    /// connection.
    #[must_use]
    pub fn server_params(&self, parts: &Parts) -> ServerParams {
        let request_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let server_name = parts
            .headers
            .get(HOST)
            .and_then(|host| host.to_str().ok())
            .map(strip_port)
            .filter(|host| !host.is_empty())
            .map_or_else(|| self.local.ip().to_string(), str::to_string);

        ServerParams::new()
            .with(ServerParams::REMOTE_ADDR, self.remote.ip().to_string())
            .with(ServerParams::REMOTE_PORT, self.remote.port().to_string())
            .with(ServerParams::SERVER_PROTOCOL, protocol_name(parts.version))
            .with(ServerParams::REQUEST_TIME, request_time.to_string())
            .with(ServerParams::SERVER_NAME, server_name)
    }
}

/// Returns the `SERVER_PROTOCOL` spelling of an HTTP version.
#[must_use]
pub fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Drops the port from a `Host` value, keeping bracketed IPv6 literals.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// Collects a request body, failing once it grows past `limit` bytes.
///
/// # Errors
///
/// 413 when the body is too large, 400 when the client stream breaks.
pub async fn collect_body(body: Incoming, limit: usize) -> Result<Bytes, Failure> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(Failure::http(
            HttpProblem::new(http::StatusCode::PAYLOAD_TOO_LARGE).with_detail(format!(
                "Request body exceeds the limit of {limit} bytes"
            )),
        )),
        Err(e) => Err(Failure::http(
            HttpProblem::new(http::StatusCode::BAD_REQUEST)
                .with_detail("Failed to read request body"),
        )
        .with_source(e)),
    }
}

/// Assembles a Meridian request from the hyper head and a collected body.
#[must_use]
pub fn into_request(parts: Parts, body: Bytes, params: ServerParams) -> Request {
    Request::from_http(http::Request::from_parts(parts, body)).with_server_params(params)
}
