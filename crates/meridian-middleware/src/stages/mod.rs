//! Built-in pipeline stages, one module per [`Stage`](crate::Stage).

pub mod adapt;
pub mod context;
pub mod dispatch;
pub mod normalization;
pub mod routing;
pub mod static_assets;

pub use adapt::{RequestAdapterMiddleware, DEFAULT_MAX_BODY_BYTES};
pub use context::{MatchedRoute, RequestContextMiddleware, REQUEST_ID_HEADER, UNMATCHED_ROUTE};
pub use dispatch::DispatchMiddleware;
pub use normalization::NormalizationMiddleware;
pub use routing::RoutingMiddleware;
pub use static_assets::StaticAssetsMiddleware;
