//! The failure boundary.
//!
//! [`Kernel::handle`] is the single entry point the transport calls. It
//! keeps a snapshot of the inbound request, runs the [`Pipeline`] with panic
//! capture, and turns any [`Failure`] (or panic) into a problem response:
//!
//! ```text
//! Request → Kernel → Pipeline ─────────────── Ok ──→ Response
//!                       │
//!                       └─ Err / panic → ProblemFactory → ProblemRenderer → Response
//! ```

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::stages::context::{REQUEST_ID_HEADER, UNMATCHED_ROUTE};
use crate::stages::{
    DispatchMiddleware, NormalizationMiddleware, RequestAdapterMiddleware,
    RequestContextMiddleware, RoutingMiddleware, StaticAssetsMiddleware,
};
use bytes::Bytes;
use futures_util::FutureExt;
use meridian_config::{AppSettings, MeridianConfig};
use meridian_core::{
    AttributeKey, AttributeValue, ContentNegotiator, Dispatcher, Failure, Invoker, Renderer,
    Request, RequestContext, RequestId, Response, ResponseNormalizer, Router, TemplateRegistry,
};
use meridian_problem::{ProblemFactory, ProblemRenderer};
use meridian_telemetry::metrics::record_request;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Type name reported for panics.
pub const PANIC_TYPE_NAME: &str = "Panic";

/// Runs the pipeline and renders failures.
pub struct Kernel {
    pipeline: Pipeline,
    factory: ProblemFactory,
    renderer: ProblemRenderer,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("pipeline", &self.pipeline)
            .field("factory", &self.factory)
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl Kernel {
    /// Creates a kernel from its parts.
    #[must_use]
    pub fn new(pipeline: Pipeline, factory: ProblemFactory, renderer: ProblemRenderer) -> Self {
        Self {
            pipeline,
            factory,
            renderer,
        }
    }

    /// Starts building a kernel from configuration.
    #[must_use]
    pub fn builder(config: MeridianConfig) -> KernelBuilder {
        KernelBuilder::new(config)
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the problem factory.
    #[must_use]
    pub fn factory(&self) -> &ProblemFactory {
        &self.factory
    }

    /// Handles a request. Never fails: failures become problem responses.
    pub async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();
        let snapshot = request.clone();

        let outcome = AssertUnwindSafe(self.pipeline.process(request))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(failure)) => failure,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, path = %snapshot.path(), "Request handling panicked");
                Failure::application(message).with_type_name(PANIC_TYPE_NAME)
            }
        };

        let response = self.render_failure(&failure, snapshot);
        record_request(UNMATCHED_ROUTE, response.status().as_u16(), started.elapsed());
        response
    }

    /// Handles a collected `http` request.
    pub async fn handle_http(&self, request: http::Request<Bytes>) -> Response {
        self.handle(Request::from_http(request)).await
    }

    /// Renders a failure raised while handling `request`.
    #[must_use]
    pub fn render_failure(&self, failure: &Failure, request: Request) -> Response {
        let request = restore_context(request, failure);
        let document = self.factory.create(failure, &request);
        self.renderer.render(document)
    }
}

/// Re-attaches the request context to the pre-pipeline snapshot, using the
/// request id the context stage put on the failure.
fn restore_context(request: Request, failure: &Failure) -> Request {
    if request.context().is_some() {
        return request;
    }
    let request_id = failure
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(RequestId::parse);
    match request_id {
        Some(id) => request.with_attribute(
            AttributeKey::Context,
            AttributeValue::Context(Arc::new(RequestContext::with_request_id(id))),
        ),
        None => request,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

/// Builder wiring a [`Kernel`] from configuration and collaborators.
///
/// # Example
///
/// ```
/// use meridian_config::MeridianConfig;
/// use meridian_core::{HandlerDescriptor, RouteTable, TemplateRegistry};
/// use meridian_middleware::Kernel;
///
/// let routes = RouteTable::new()
///     .get("/", HandlerDescriptor::parse("home").unwrap());
/// let templates = TemplateRegistry::new().with_template("home", "<h1>Home</h1>");
///
/// let kernel = Kernel::builder(MeridianConfig::development())
///     .router(routes)
///     .renderer(templates)
///     .build()
///     .unwrap();
/// assert_eq!(
///     kernel.pipeline().stage_names(),
///     ["request_adapter", "request_context", "routing", "dispatch", "normalization"]
/// );
/// ```
pub struct KernelBuilder {
    config: MeridianConfig,
    router: Option<Arc<dyn Router>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl KernelBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: MeridianConfig) -> Self {
        Self {
            config,
            router: None,
            dispatcher: None,
            renderer: None,
        }
    }

    /// Sets the router. Required.
    #[must_use]
    pub fn router<R: Router>(mut self, router: R) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    /// Sets the dispatcher. Defaults to an [`Invoker`] over the renderer.
    #[must_use]
    pub fn dispatcher<D: Dispatcher>(mut self, dispatcher: D) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Sets the template renderer used by handlers and error pages.
    /// Defaults to an empty [`TemplateRegistry`].
    #[must_use]
    pub fn renderer<R: Renderer>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Builds the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingComponent`] when no router was set.
    pub fn build(self) -> Result<Kernel, PipelineError> {
        let router = self
            .router
            .ok_or_else(|| PipelineError::missing_component("router"))?;
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(TemplateRegistry::new()));
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(Invoker::new(Arc::clone(&renderer))));

        let config = self.config;
        let settings = Arc::new(AppSettings::from_config(&config.app));
        let negotiator = ContentNegotiator::new().with_api_prefix(config.app.api_prefix.as_str());
        let normalizer = ResponseNormalizer::new(negotiator.clone());

        let pipeline = Pipeline::builder()
            .stage(RequestAdapterMiddleware::new(config.server.max_body_bytes))
            .stage(RequestContextMiddleware::new())
            .stage_if(
                config.static_assets.enabled,
                StaticAssetsMiddleware::from_config(&config.static_assets, settings.project_root()),
            )
            .stage(RoutingMiddleware::new(router))
            .stage(DispatchMiddleware::new(dispatcher))
            .stage(NormalizationMiddleware::new(normalizer.clone()))
            .build()?;

        let factory = ProblemFactory::new(settings).with_negotiator(negotiator);
        let renderer = ProblemRenderer::new()
            .with_templates(renderer)
            .with_normalizer(normalizer);

        Ok(Kernel::new(pipeline, factory, renderer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::StatusCode;
    use meridian_config::{AppConfig, StaticAssetsConfig};
    use meridian_core::{FnHandler, HandlerDescriptor, HandlerValue, ResponseExt, RouteTable};
    use serde_json::Value;

    fn kernel(debug: bool) -> Kernel {
        let mut config = if debug {
            MeridianConfig::development()
        } else {
            MeridianConfig::production()
        };
        config.app.project_root = "/srv/app".into();

        let routes = RouteTable::new()
            .get("/api/boom", HandlerDescriptor::parse("Boom::panic").unwrap())
            .get("/api/ok", HandlerDescriptor::parse("Ok::index").unwrap());
        let invoker = Invoker::new(Arc::new(TemplateRegistry::new()))
            .register(
                "Boom::panic",
                FnHandler::new("Boom::panic", |_request, _ctx| async {
                    if true {
                        panic!("exploded in /srv/app/src/boom.rs");
                    }
                    Ok(HandlerValue::Empty)
                }),
            )
            .register(
                "Ok::index",
                FnHandler::new("Ok::index", |_request, _ctx| async {
                    Ok(HandlerValue::Json(serde_json::json!({"ok": true})))
                }),
            );

        Kernel::builder(config)
            .router(routes)
            .dispatcher(invoker)
            .build()
            .unwrap()
    }

    fn body_json(response: &Response) -> Value {
        serde_json::from_slice(&response.body_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let request = Request::builder().uri("/api/ok").build().unwrap();
        let response = kernel(false).handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response), serde_json::json!({"ok": true}));
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_route_not_found_becomes_problem() {
        let request = Request::builder().uri("/api/missing").build().unwrap();
        let response = kernel(false).handle(request).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = body_json(&response);
        assert_eq!(body["status"], 404);
        assert_eq!(body["instance"], "/api/missing");
        assert!(body["extensions"]["throwable"].is_null());
    }

    #[tokio::test]
    async fn test_panic_becomes_500_problem() {
        let request = Request::builder().uri("/api/boom").build().unwrap();
        let response = kernel(true).handle(request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(&response);
        assert_eq!(body["extensions"]["throwable"]["type"], PANIC_TYPE_NAME);
        let rendered = body.to_string();
        assert!(!rendered.contains("/srv/app"));
        assert!(rendered.contains("{PROJECT_ROOT}/src/boom.rs"));
    }

    #[tokio::test]
    async fn test_panic_hidden_in_production() {
        let request = Request::builder().uri("/api/boom").build().unwrap();
        let response = kernel(false).handle(request).await;
        let body = body_json(&response);
        assert_eq!(body["detail"], "Internal Server Error");
        assert!(body["extensions"]["throwable"].is_null());
    }

    #[tokio::test]
    async fn test_handle_http() {
        let request = http::Request::builder()
            .uri("/api/ok")
            .body(Bytes::new())
            .unwrap();
        let response = kernel(false).handle_http(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_builder_requires_router() {
        let err = Kernel::builder(MeridianConfig::default()).build().unwrap_err();
        assert_eq!(err, PipelineError::missing_component("router"));
    }

    #[test]
    fn test_builder_static_stage_from_config() {
        let config = MeridianConfig::builder()
            .app(AppConfig::default())
            .static_assets(StaticAssetsConfig {
                enabled: true,
                ..StaticAssetsConfig::default()
            })
            .build();
        let kernel = Kernel::builder(config)
            .router(RouteTable::new())
            .build()
            .unwrap();
        assert_eq!(kernel.pipeline().stage_count(), 6);
        assert!(kernel.pipeline().has_stage(crate::Stage::StaticAssets));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }
}
