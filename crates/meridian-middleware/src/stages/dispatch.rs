//! Dispatch middleware.
//!
//! Hands the matched route to the [`Dispatcher`] and stores the raw
//! [`HandlerValue`](meridian_core::HandlerValue) as the
//! [`AttributeKey::HandlerResult`] attribute for the normalization stage.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use meridian_core::{
    AttributeKey, AttributeValue, BoxFuture, Dispatcher, Failure, Request, Response,
};
use std::sync::Arc;
use tracing::debug;

/// Middleware that invokes the handler.
#[derive(Clone)]
pub struct DispatchMiddleware {
    dispatcher: Arc<dyn Dispatcher>,
}

impl std::fmt::Debug for DispatchMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMiddleware").finish_non_exhaustive()
    }
}

impl DispatchMiddleware {
    /// Creates the middleware around a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Middleware for DispatchMiddleware {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn stage(&self) -> Stage {
        Stage::Dispatch
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let Some(AttributeValue::Route(route)) =
                request.attribute(&AttributeKey::Route).cloned()
            else {
                return Err(Failure::dispatch("No route was matched before dispatch"));
            };
            let ctx = request.context().cloned().unwrap_or_default();

            let value = self.dispatcher.dispatch(&route, &request, &ctx).await?;
            debug!(
                handler = %route.handler().label(),
                value = value.kind(),
                "Handler returned"
            );

            let request = request.with_attribute(
                AttributeKey::HandlerResult,
                AttributeValue::HandlerResult(Arc::new(value)),
            );
            next.run(request).await
        })
    }
}
