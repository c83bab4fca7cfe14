//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every pipeline stage
//! implements. A stage receives the request and a [`Next`] handle to the
//! rest of the chain; it may delegate, short-circuit with its own response,
//! or fail with a [`Failure`] that propagates to the kernel.
//!
//! # Example
//!
//! ```
//! use meridian_core::{BoxFuture, Failure, Request, Response};
//! use meridian_middleware::{Middleware, Next, Stage};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn stage(&self) -> Stage {
//!         Stage::Context
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<Response, Failure>> {
//!         Box::pin(async move {
//!             let started = std::time::Instant::now();
//!             let response = next.run(request).await;
//!             tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "done");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::pipeline::Stage;
use meridian_core::{BoxFuture, Failure, Request, Response};

/// Message of the failure raised when every stage delegated.
pub const NO_RESPONSE: &str = "pipeline produced no response";

/// A pipeline stage.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once.
/// - A stage never swallows a downstream [`Failure`]; it may decorate it.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name used in logs and [`Pipeline::stage_names`](crate::Pipeline::stage_names).
    fn name(&self) -> &'static str;

    /// Returns the slot this middleware occupies in the pipeline.
    fn stage(&self) -> Stage;

    /// Processes the request.
    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>>;
}

/// Handle to the remainder of the chain.
///
/// Consumed by [`Next::run`], so the rest of the chain runs at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    End,
}

impl<'a> Next<'a> {
    /// Creates a `Next` that invokes `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the end of the chain.
    pub(crate) fn end() -> Self {
        Self {
            inner: NextInner::End,
        }
    }

    /// Runs the next stage.
    ///
    /// Past the last stage this fails with [`NO_RESPONSE`].
    pub async fn run(self, request: Request) -> Result<Response, Failure> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(request, *next).await,
            NextInner::End => Err(Failure::application(NO_RESPONSE)),
        }
    }

    /// Returns `true` if no stage remains.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self.inner, NextInner::End)
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```
/// use meridian_middleware::{FnMiddleware, Stage};
/// use http::header::{HeaderName, HeaderValue};
///
/// let middleware = FnMiddleware::new("powered_by", Stage::Context, |request, next| {
///     Box::pin(async move {
///         let mut response = next.run(request).await?;
///         response.headers_mut().insert(
///             HeaderName::from_static("x-powered-by"),
///             HeaderValue::from_static("meridian"),
///         );
///         Ok(response)
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    stage: Stage,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response, Failure>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a function-based middleware occupying `stage`.
    pub const fn new(name: &'static str, stage: Stage, func: F) -> Self {
        Self { name, stage, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response, Failure>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        (self.func)(request, next)
    }
}
