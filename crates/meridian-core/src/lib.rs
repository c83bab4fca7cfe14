//! # Meridian Core
//!
//! Value objects and contracts shared by every Meridian crate.
//!
//! - [`Request`] - immutable-per-step request with parsed parts and typed attributes
//! - [`Response`] / [`ResponseExt`] - `http` response alias and helpers
//! - [`ContentType`] - closed set of representation formats
//! - [`ContentNegotiator`] - picks the representation a caller wants
//! - [`ResponseNormalizer`] - turns a [`HandlerValue`] into a response
//! - [`Failure`] - failure taxonomy raised inside the pipeline
//! - [`Router`], [`Dispatcher`], [`Renderer`] - narrow contracts for routing,
//!   handler execution and templates, with reference implementations
//!
//! ## Example
//!
//! ```
//! use meridian_core::{ContentNegotiator, HandlerValue, Request, ResponseNormalizer};
//! use http::StatusCode;
//!
//! let request = Request::builder().uri("/api/status").build().unwrap();
//! let normalizer = ResponseNormalizer::new(ContentNegotiator::new());
//!
//! let response = normalizer.normalize(&request, serde_json::json!({"up": true}).into());
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.headers()["content-type"], "application/json");
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attributes;
pub mod content_type;
mod context;
pub mod dispatch;
mod error;
pub mod failure;
pub mod files;
pub mod negotiation;
pub mod normalize;
pub mod params;
pub mod render;
pub mod request;
pub mod response;
pub mod routing;

pub use attributes::{AttributeKey, AttributeValue, Attributes};
pub use content_type::ContentType;
pub use context::{RequestContext, RequestId};
pub use dispatch::{BoxFuture, Dispatcher, FnHandler, Handler, HandlerDescriptor, Invoker};
pub use error::RequestError;
pub use failure::{
    BoxError, Failure, FailureCode, FailureKind, FailureLocation, FailureResult, HttpProblem,
    TraceFrame,
};
pub use files::{FileNode, UploadedFile, UploadedFiles};
pub use negotiation::ContentNegotiator;
pub use normalize::{HandlerValue, ResponseNormalizer, SerializationFailure};
pub use params::{ParamBag, ServerParams};
pub use render::{RenderError, Renderer, TemplateRegistry};
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseExt, StatusClass};
pub use routing::{PathParams, RouteMatch, RouteTable, Router};
