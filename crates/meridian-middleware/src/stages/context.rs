//! Request context middleware.
//!
//! Assigns each request a [`RequestId`] and a [`RequestContext`], runs the
//! rest of the pipeline inside a `request` span and records the request
//! metrics.
//!
//! ## Request ID sources
//!
//! 1. **X-Request-Id header**: a valid UUID is kept as-is
//! 2. **Generated UUID v7**: otherwise
//!
//! The id is echoed in the `X-Request-Id` header of every response,
//! including problem responses: on failure the header is attached to the
//! [`Failure`] so the renderer copies it.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use http::header::{HeaderName, HeaderValue};
use meridian_core::{
    AttributeKey, AttributeValue, BoxFuture, Failure, Request, RequestContext, RequestId,
    Response,
};
use meridian_telemetry::metrics::{record_request, InFlightGuard};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Route label for responses no route produced.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Response extension naming the route pattern that produced a response.
///
/// Set by the normalization and static assets stages; used as the metrics
/// route label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(String);

impl MatchedRoute {
    /// Creates a route label.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Returns the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reads a valid request id from the `X-Request-Id` header.
#[must_use]
pub fn inbound_request_id(request: &Request) -> Option<RequestId> {
    request.header(REQUEST_ID_HEADER).and_then(RequestId::parse)
}

/// Middleware that creates the request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContextMiddleware;

impl RequestContextMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for RequestContextMiddleware {
    fn name(&self) -> &'static str {
        "request_context"
    }

    fn stage(&self) -> Stage {
        Stage::Context
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        let request_id = inbound_request_id(&request).unwrap_or_else(RequestId::new);
        let ctx = Arc::new(RequestContext::with_request_id(request_id));
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.path(),
        );

        Box::pin(
            async move {
                let _in_flight = InFlightGuard::new();
                info!("Request started");

                let request = request.with_attribute(
                    AttributeKey::Context,
                    AttributeValue::Context(Arc::clone(&ctx)),
                );
                let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
                let header_value = HeaderValue::from_str(&request_id.to_string()).ok();

                match next.run(request).await {
                    Ok(mut response) => {
                        let elapsed = ctx.elapsed();
                        let status = response.status().as_u16();
                        let route = response
                            .extensions()
                            .get::<MatchedRoute>()
                            .map_or(UNMATCHED_ROUTE, MatchedRoute::as_str);
                        record_request(route, status, elapsed);
                        info!(
                            status,
                            route,
                            duration_ms = elapsed.as_secs_f64() * 1000.0,
                            "Request completed"
                        );

                        if let Some(value) = header_value {
                            response.headers_mut().insert(header_name, value);
                        }
                        Ok(response)
                    }
                    Err(failure) => {
                        info!(
                            kind = failure.kind().type_name(),
                            duration_ms = ctx.elapsed().as_secs_f64() * 1000.0,
                            "Request failed"
                        );
                        Err(match header_value {
                            Some(value) => failure.with_header(header_name, value),
                            None => failure,
                        })
                    }
                }
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use crate::pipeline::Pipeline;
    use http::StatusCode;
    use meridian_core::ResponseExt;

    fn echo_context_pipeline() -> Pipeline {
        Pipeline::builder()
            .stage(RequestContextMiddleware::new())
            .stage(FnMiddleware::new("echo", Stage::Normalization, |request, _next| {
                Box::pin(async move {
                    let id = request
                        .context()
                        .map(|ctx| ctx.request_id().to_string())
                        .unwrap_or_default();
                    let mut response = Response::text(StatusCode::OK, id);
                    response.extensions_mut().insert(MatchedRoute::new("/echo"));
                    Ok(response)
                })
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let request = Request::builder().uri("/echo").build().unwrap();
        let response = echo_context_pipeline().process(request).await.unwrap();

        let header = response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
        assert!(RequestId::parse(header).is_some());
        assert_eq!(response.body_bytes(), header.as_bytes());
    }

    #[tokio::test]
    async fn test_honours_valid_inbound_id() {
        let id = "01890a5d-ac96-774b-bcce-b302099a8057";
        let request = Request::builder()
            .uri("/echo")
            .header("X-Request-Id", id)
            .build()
            .unwrap();
        let response = echo_context_pipeline().process(request).await.unwrap();
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), id);
    }

    #[tokio::test]
    async fn test_replaces_invalid_inbound_id() {
        let request = Request::builder()
            .uri("/echo")
            .header("X-Request-Id", "not-a-uuid")
            .build()
            .unwrap();
        let response = echo_context_pipeline().process(request).await.unwrap();
        assert_ne!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "not-a-uuid");
    }

    #[tokio::test]
    async fn test_failure_carries_request_id() {
        let pipeline = Pipeline::builder()
            .stage(RequestContextMiddleware::new())
            .build()
            .unwrap();
        let request = Request::builder().uri("/").build().unwrap();
        let failure = pipeline.process(request).await.unwrap_err();
        let header = failure.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(RequestId::parse(header.to_str().unwrap()).is_some());
    }
}
