//! Routing middleware.
//!
//! Asks the [`Router`] for a match and stores it as the
//! [`AttributeKey::Route`] attribute. A miss propagates as a
//! route-not-found failure.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use meridian_core::{
    AttributeKey, AttributeValue, BoxFuture, Failure, Request, Response, Router,
};
use std::sync::Arc;
use tracing::debug;

/// Middleware that matches the route.
#[derive(Clone)]
pub struct RoutingMiddleware {
    router: Arc<dyn Router>,
}

impl std::fmt::Debug for RoutingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingMiddleware").finish_non_exhaustive()
    }
}

impl RoutingMiddleware {
    /// Creates the middleware around a router.
    #[must_use]
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }
}

impl Middleware for RoutingMiddleware {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn stage(&self) -> Stage {
        Stage::Routing
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let matched = self.router.match_route(request.method(), request.path())?;
            debug!(
                route = %matched.pattern(),
                handler = %matched.handler().label(),
                "Route matched"
            );
            let request =
                request.with_attribute(AttributeKey::Route, AttributeValue::Route(Arc::new(matched)));
            next.run(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use crate::pipeline::Pipeline;
    use http::{Method, StatusCode};
    use meridian_core::{FailureKind, HandlerDescriptor, ResponseExt, RouteTable};

    fn pipeline() -> Pipeline {
        let table = RouteTable::new().get(
            "/users/{id}",
            HandlerDescriptor::parse("Users::show").unwrap(),
        );
        Pipeline::builder()
            .stage(RoutingMiddleware::new(Arc::new(table)))
            .stage(FnMiddleware::new("echo", Stage::Normalization, |request, _next| {
                Box::pin(async move {
                    let id = request
                        .route()
                        .and_then(|route| route.params().get("id"))
                        .unwrap_or_default()
                        .to_string();
                    Ok(Response::text(StatusCode::OK, id))
                })
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stores_route_match() {
        let request = Request::builder().uri("/users/42").build().unwrap();
        let response = pipeline().process(request).await.unwrap();
        assert_eq!(response.body_bytes(), "42".as_bytes());
    }

    #[tokio::test]
    async fn test_miss_propagates() {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/users/42")
            .build()
            .unwrap();
        let failure = pipeline().process(request).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::RouteNotFound);
    }
}
