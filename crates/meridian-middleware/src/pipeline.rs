//! Fixed-order middleware pipeline.
//!
//! Every request flows through the same stages in the same order:
//!
//! 1. **Adapt** - parse query, cookies and body
//! 2. **Context** - assign the request id, open the span, record metrics
//! 3. **Static assets** - serve files from disk (optional)
//! 4. **Routing** - match the route
//! 5. **Dispatch** - invoke the handler
//! 6. **Normalization** - turn the handler value into a response
//!
//! The order comes from [`Stage`], not from registration order, and a
//! built [`Pipeline`] cannot be modified.

use crate::error::PipelineError;
use crate::middleware::{Middleware, Next};
use meridian_core::{Failure, Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The immutable, ordered middleware pipeline.
///
/// # Example
///
/// ```
/// use meridian_core::{Request, Response, ResponseExt};
/// use meridian_middleware::{FnMiddleware, Pipeline, Stage};
/// use http::StatusCode;
///
/// # tokio_test_block(async {
/// let pipeline = Pipeline::builder()
///     .stage(FnMiddleware::new("hello", Stage::Normalization, |_request, _next| {
///         Box::pin(async { Ok(Response::text(StatusCode::OK, "hello")) })
///     }))
///     .build()
///     .unwrap();
///
/// let request = Request::builder().uri("/").build().unwrap();
/// let response = pipeline.process(request).await.unwrap();
/// assert_eq!(response.status(), StatusCode::OK);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through every stage.
    ///
    /// Failures are returned as-is; turning them into responses is the
    /// [`Kernel`](crate::Kernel)'s job.
    pub async fn process(&self, request: Request) -> Result<Response, Failure> {
        self.build_chain().run(request).await
    }

    fn build_chain(&self) -> Next<'_> {
        self.stages
            .iter()
            .rev()
            .fold(Next::end(), |next, middleware| {
                Next::new(middleware.as_ref(), next)
            })
    }

    /// Returns the names of all middleware in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the occupied stages in order.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|mw| mw.stage()).collect()
    }

    /// Returns the number of middleware.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if `stage` is occupied.
    #[must_use]
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.iter().any(|mw| mw.stage() == stage)
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a middleware; its position comes from [`Middleware::stage`].
    #[must_use]
    pub fn stage<M: Middleware>(self, middleware: M) -> Self {
        self.boxed_stage(Arc::new(middleware))
    }

    /// Adds an already shared middleware.
    #[must_use]
    pub fn boxed_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Adds a middleware when `enabled` is true.
    #[must_use]
    pub fn stage_if<M: Middleware>(self, enabled: bool, middleware: M) -> Self {
        if enabled {
            self.stage(middleware)
        } else {
            self
        }
    }

    /// Orders the middleware by stage and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateStage`] when two middleware claim
    /// the same stage.
    pub fn build(mut self) -> Result<Pipeline, PipelineError> {
        self.stages.sort_by_key(|mw| mw.stage());
        if let Some(pair) = self
            .stages
            .windows(2)
            .find(|pair| pair[0].stage() == pair[1].stage())
        {
            return Err(PipelineError::duplicate_stage(pair[0].stage().name()));
        }
        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

/// Pipeline slot of a middleware, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: request adaptation
    Adapt = 1,
    /// Stage 2: request context, span and metrics
    Context = 2,
    /// Stage 3: static assets
    StaticAssets = 3,
    /// Stage 4: routing
    Routing = 4,
    /// Stage 5: handler dispatch
    Dispatch = 5,
    /// Stage 6: response normalization
    Normalization = 6,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adapt => "adapt",
            Self::Context => "context",
            Self::StaticAssets => "static_assets",
            Self::Routing => "routing",
            Self::Dispatch => "dispatch",
            Self::Normalization => "normalization",
        }
    }

    /// Returns the 1-based rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 6] {
        [
            Self::Adapt,
            Self::Context,
            Self::StaticAssets,
            Self::Routing,
            Self::Dispatch,
            Self::Normalization,
        ]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
