//! Dispatch contract.
//!
//! A route resolves to a [`HandlerDescriptor`], a closed set of handler
//! shapes. A [`Dispatcher`] turns the descriptor into a [`HandlerValue`].
//!
//! Descriptors parse from strings:
//!
//! | Input               | Descriptor                                 |
//! |---------------------|--------------------------------------------|
//! | `redirect:/login`   | `RedirectDirective("/login")` (302 Found)  |
//! | `Orders::show`      | `MethodReference { Orders, show }`         |
//! | `pages/about`       | `TemplatePath("pages/about")`              |
//! | `""`, `::x`, `X::`  | dispatch failure                           |
//!
//! [`Invoker`] is the reference dispatcher: templates go to a
//! [`Renderer`], method references are looked up in a registry of named
//! handlers, and invocables are called directly.

use crate::context::RequestContext;
use crate::failure::{Failure, FailureKind, TraceFrame};
use crate::normalize::HandlerValue;
use crate::render::Renderer;
use crate::request::Request;
use crate::response::{Response, ResponseExt};
use crate::routing::RouteMatch;
use http::StatusCode;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Prefix marking a redirect descriptor.
pub const REDIRECT_PREFIX: &str = "redirect:";

/// An invocable request handler.
pub trait Handler: Send + Sync + 'static {
    /// Name recorded in failure traces.
    fn name(&self) -> &str;

    /// Handles the request.
    fn call(
        &self,
        request: Request,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<HandlerValue, Failure>>;
}

/// A handler built from an async function.
///
/// # Example
///
/// ```
/// use meridian_core::{FnHandler, HandlerValue};
///
/// let handler = FnHandler::new("ping", |_request, _ctx| async {
///     Ok(HandlerValue::from("pong"))
/// });
/// ```
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F> {
    /// Creates a named function handler.
    pub fn new<Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Request, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerValue, Failure>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerValue, Failure>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        request: Request,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<HandlerValue, Failure>> {
        Box::pin((self.func)(request, ctx))
    }
}

/// The shape of the handler a route points to.
#[derive(Clone)]
pub enum HandlerDescriptor {
    /// Render a named template.
    TemplatePath(String),
    /// Call a registered handler by `Type::method` name.
    MethodReference {
        /// Type part of the reference.
        type_name: String,
        /// Method part of the reference.
        method: String,
    },
    /// Redirect to a URL with 302 Found.
    RedirectDirective(String),
    /// Call a handler object directly.
    Invocable(Arc<dyn Handler>),
}

impl HandlerDescriptor {
    /// Parses a descriptor string.
    pub fn parse(descriptor: &str) -> Result<Self, Failure> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(Failure::dispatch("Empty handler descriptor"));
        }

        if let Some(target) = descriptor.strip_prefix(REDIRECT_PREFIX) {
            let target = target.trim();
            if target.is_empty() {
                return Err(Failure::dispatch("Redirect descriptor has no target"));
            }
            return Ok(Self::RedirectDirective(target.to_string()));
        }

        if let Some((type_name, method)) = descriptor.rsplit_once("::") {
            if type_name.is_empty() || method.is_empty() {
                return Err(Failure::dispatch(format!(
                    "Malformed handler reference '{descriptor}'"
                )));
            }
            return Ok(Self::MethodReference {
                type_name: type_name.to_string(),
                method: method.to_string(),
            });
        }

        Ok(Self::TemplatePath(descriptor.to_string()))
    }

    /// Wraps a handler object.
    pub fn invocable(handler: impl Handler) -> Self {
        Self::Invocable(Arc::new(handler))
    }

    /// Returns a short label for logs and traces.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::TemplatePath(path) => format!("template:{path}"),
            Self::MethodReference { type_name, method } => format!("{type_name}::{method}"),
            Self::RedirectDirective(url) => format!("{REDIRECT_PREFIX}{url}"),
            Self::Invocable(handler) => handler.name().to_string(),
        }
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplatePath(path) => f.debug_tuple("TemplatePath").field(path).finish(),
            Self::MethodReference { type_name, method } => f
                .debug_struct("MethodReference")
                .field("type_name", type_name)
                .field("method", method)
                .finish(),
            Self::RedirectDirective(url) => f.debug_tuple("RedirectDirective").field(url).finish(),
            Self::Invocable(handler) => f.debug_tuple("Invocable").field(&handler.name()).finish(),
        }
    }
}

/// Executes the handler of a matched route.
pub trait Dispatcher: Send + Sync + 'static {
    /// Dispatches to the route's handler and returns its raw value.
    fn dispatch<'a>(
        &'a self,
        route: &'a RouteMatch,
        request: &'a Request,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<HandlerValue, Failure>>;
}

/// Reference dispatcher.
pub struct Invoker {
    renderer: Arc<dyn Renderer>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Invoker {
    /// Creates an invoker rendering templates with `renderer`.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under a `Type::method` reference.
    #[must_use]
    pub fn register(mut self, reference: impl Into<String>, handler: impl Handler) -> Self {
        self.handlers.insert(reference.into(), Arc::new(handler));
        self
    }

    /// Returns `true` if a reference is registered.
    #[must_use]
    pub fn is_registered(&self, reference: &str) -> bool {
        self.handlers.contains_key(reference)
    }

    fn render_template(
        &self,
        template: &str,
        route: &RouteMatch,
        request: &Request,
    ) -> Result<HandlerValue, Failure> {
        let mut vars = Map::new();
        for (key, values) in request.query_params().iter() {
            if let Some(first) = values.first() {
                vars.insert(key.to_string(), Value::String(first.clone()));
            }
        }
        for (key, value) in route.params().iter() {
            vars.insert(key.to_string(), Value::String(value.to_string()));
        }

        self.renderer
            .render(template, &Value::Object(vars))
            .map(HandlerValue::Text)
            .map_err(|err| {
                Failure::dispatch(format!("Template '{template}' could not be rendered"))
                    .with_source(err)
            })
    }

    async fn invoke(
        handler: &Arc<dyn Handler>,
        route: &RouteMatch,
        request: &Request,
        ctx: &RequestContext,
    ) -> Result<HandlerValue, Failure> {
        match handler.call(request.clone(), ctx.clone()).await {
            Ok(value) => Ok(value),
            Err(failure) if failure.kind() != FailureKind::Application => Err(failure),
            Err(failure) => {
                let frame = TraceFrame::new(handler.name()).with_args(
                    route
                        .params()
                        .iter()
                        .map(|(_, v)| Value::String(v.to_string()))
                        .collect(),
                );
                let mut wrapped = Failure::dispatch(format!(
                    "Handler '{}' failed: {}",
                    handler.name(),
                    failure.message()
                ))
                .with_frame(frame);
                if let Some(code) = failure.code() {
                    wrapped = wrapped.with_code(code.clone());
                }
                for (name, value) in failure.headers() {
                    wrapped = wrapped.with_header(name.clone(), value.clone());
                }
                Err(wrapped.with_source(failure))
            }
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut references: Vec<&String> = self.handlers.keys().collect();
        references.sort();
        f.debug_struct("Invoker")
            .field("handlers", &references)
            .finish_non_exhaustive()
    }
}

impl Dispatcher for Invoker {
    fn dispatch<'a>(
        &'a self,
        route: &'a RouteMatch,
        request: &'a Request,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<HandlerValue, Failure>> {
        Box::pin(async move {
            match route.handler() {
                HandlerDescriptor::TemplatePath(template) => {
                    self.render_template(template, route, request)
                }
                HandlerDescriptor::RedirectDirective(url) => Ok(HandlerValue::Response(
                    Response::redirect(url, StatusCode::FOUND),
                )),
                HandlerDescriptor::MethodReference { type_name, method } => {
                    let reference = format!("{type_name}::{method}");
                    let handler = self.handlers.get(&reference).ok_or_else(|| {
                        Failure::dispatch(format!("No handler registered for '{reference}'"))
                    })?;
                    Self::invoke(handler, route, request, ctx).await
                }
                HandlerDescriptor::Invocable(handler) => {
                    Self::invoke(handler, route, request, ctx).await
                }
            }
        })
    }
}
