//! # Meridian Middleware
//!
//! The fixed-order request pipeline and the failure boundary around it.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → Adapt → Context → [Static assets] → Routing → Dispatch → Normalization
//!                                                                        ↓
//! Response ←──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Stage | Middleware                   | Purpose                                     |
//! |-------|------------------------------|---------------------------------------------|
//! | 1     | `RequestAdapterMiddleware`   | Parse query, cookies, JSON/form/multipart   |
//! | 2     | `RequestContextMiddleware`   | Request id, span, metrics                   |
//! | 3     | `StaticAssetsMiddleware`     | Serve files with caching headers (optional) |
//! | 4     | `RoutingMiddleware`          | Match the route                             |
//! | 5     | `DispatchMiddleware`         | Invoke the handler                          |
//! | 6     | `NormalizationMiddleware`    | Handler value → response                    |
//!
//! Stages return `Result<Response, Failure>` and propagate failures with
//! `?`. Only the [`Kernel`] turns failures, and panics, into problem
//! responses.
//!
//! ## Example
//!
//! ```
//! use meridian_middleware::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 6);
//! assert_eq!(stages[0].name(), "adapt");
//! assert_eq!(stages[5].name(), "normalization");
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod kernel;
pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use error::PipelineError;
pub use kernel::{Kernel, KernelBuilder};
pub use middleware::{FnMiddleware, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder, Stage};
pub use stages::{
    DispatchMiddleware, MatchedRoute, NormalizationMiddleware, RequestAdapterMiddleware,
    RequestContextMiddleware, RoutingMiddleware, StaticAssetsMiddleware, REQUEST_ID_HEADER,
};
