//! Normalization middleware.
//!
//! The terminal stage: turns the stored handler value into the final
//! response with the [`ResponseNormalizer`]. It never calls `next`.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::stages::context::MatchedRoute;
use meridian_core::{BoxFuture, Failure, HandlerValue, Request, Response, ResponseNormalizer};

/// Middleware that produces the response.
#[derive(Debug, Clone, Default)]
pub struct NormalizationMiddleware {
    normalizer: ResponseNormalizer,
}

impl NormalizationMiddleware {
    /// Creates the middleware around a normalizer.
    #[must_use]
    pub fn new(normalizer: ResponseNormalizer) -> Self {
        Self { normalizer }
    }
}

impl Middleware for NormalizationMiddleware {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn stage(&self) -> Stage {
        Stage::Normalization
    }

    fn process<'a>(
        &'a self,
        request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let value = request
                .handler_result()
                .map(|value| HandlerValue::clone(value))
                .ok_or_else(|| Failure::dispatch("No handler result to normalize"))?;

            let mut response = self.normalizer.normalize(&request, value);
            if let Some(route) = request.route() {
                response
                    .extensions_mut()
                    .insert(MatchedRoute::new(route.pattern()));
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use http::header::CONTENT_TYPE;
    use http::StatusCode;
    use meridian_core::{
        AttributeKey, AttributeValue, FailureKind, HandlerDescriptor, PathParams, ResponseExt,
        RouteMatch,
    };
    use std::sync::Arc;

    fn pipeline() -> Pipeline {
        Pipeline::builder()
            .stage(NormalizationMiddleware::default())
            .build()
            .unwrap()
    }

    fn with_result(uri: &str, value: HandlerValue) -> Request {
        let route = RouteMatch::new(
            HandlerDescriptor::TemplatePath("items".to_string()),
            PathParams::new(),
            "/api/items",
        );
        Request::builder()
            .uri(uri)
            .build()
            .unwrap()
            .with_attribute(AttributeKey::Route, AttributeValue::Route(Arc::new(route)))
            .with_attribute(
                AttributeKey::HandlerResult,
                AttributeValue::HandlerResult(Arc::new(value)),
            )
    }

    #[tokio::test]
    async fn test_normalizes_stored_value() {
        let request = with_result("/api/items", HandlerValue::Json(serde_json::json!([1, 2])));
        let response = pipeline().process(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.body_bytes(), "[1,2]".as_bytes());
        assert_eq!(
            response.extensions().get::<MatchedRoute>(),
            Some(&MatchedRoute::new("/api/items"))
        );
    }

    #[tokio::test]
    async fn test_missing_value_is_dispatch_failure() {
        let request = Request::builder().uri("/").build().unwrap();
        let failure = pipeline().process(request).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Dispatch);
    }
}
