//! # Meridian
//!
//! An HTTP request pipeline that routes, dispatches and normalizes
//! responses, and turns every failure into an RFC 7807 problem response
//! whose representation follows the client's content preferences.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meridian::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = meridian::load_config("meridian.toml")?;
//!
//!     let routes = RouteTable::new()
//!         .get("/hello/{name}", HandlerDescriptor::parse("hello")?)
//!         .get("/old", HandlerDescriptor::parse("redirect:/new")?);
//!
//!     let kernel = Kernel::builder(config.clone())
//!         .router(routes)
//!         .renderer(TemplateRegistry::new().with_template("hello", "<h1>Hello {{ name }}</h1>"))
//!         .build()?;
//!
//!     meridian::serve(config, kernel).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! transport → Kernel → adapt → context → [static assets] → routing → dispatch → normalization
//!                ↓ any failure or panic
//!             ProblemFactory → ProblemRenderer (json | html | markdown)
//! ```

#![doc(html_root_url = "https://docs.rs/meridian/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Context as _;
use std::path::Path;
use tracing::info;

// Re-export core types
pub use meridian_core as core;

// Re-export configuration
pub use meridian_config as config;

// Re-export telemetry
pub use meridian_telemetry as telemetry;

// Re-export problem documents
pub use meridian_problem as problem;

// Re-export the pipeline and kernel
pub use meridian_middleware as middleware;

// Re-export the HTTP server
pub use meridian_server as server;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use meridian::prelude::*;
/// ```
pub mod prelude {
    pub use meridian_config::{AppSettings, ConfigLoader, MeridianConfig};
    pub use meridian_core::{
        ContentNegotiator, ContentType, Dispatcher, Failure, FailureKind, FnHandler,
        HandlerDescriptor, HandlerValue, HttpProblem, Invoker, Renderer, Request, RequestContext,
        RequestId, Response, ResponseExt, RouteMatch, RouteTable, Router, TemplateRegistry,
    };
    pub use meridian_middleware::{FnMiddleware, Kernel, Middleware, Next, Pipeline, Stage};
    pub use meridian_problem::{ProblemDocument, ProblemFactory, ProblemRenderer};
    pub use meridian_server::{Server, ShutdownSignal};
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "meridian.toml";

/// Loads configuration: defaults, then `path` if it exists, then `.env`,
/// then `MERIDIAN__SECTION__KEY` environment overrides.
///
/// # Errors
///
/// Fails when the file or an override is invalid or validation fails.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<meridian_config::MeridianConfig> {
    let path = path.as_ref();
    meridian_config::ConfigLoader::new()
        .with_defaults()
        .with_optional_file(path)
        .with_context(|| format!("failed to read configuration from {}", path.display()))?
        .with_dotenv()
        .context("failed to read .env")?
        .with_env()
        .load()
        .context("invalid configuration")
}

/// Initializes telemetry and serves `kernel` until SIGTERM or SIGINT.
///
/// # Errors
///
/// Fails when telemetry cannot be initialized or the server cannot bind.
pub async fn serve(
    config: meridian_config::MeridianConfig,
    kernel: meridian_middleware::Kernel,
) -> anyhow::Result<()> {
    meridian_telemetry::init_telemetry(&config.telemetry.logging, &config.telemetry.metrics)
        .context("failed to initialize telemetry")?;

    info!(
        service = %config.telemetry.service_name,
        environment = %config.app.environment,
        debug = config.app.debug,
        addr = %config.server.http_addr,
        "Starting Meridian"
    );

    meridian_server::Server::from_config(kernel, &config)
        .run()
        .await
        .context("server failed")
}
