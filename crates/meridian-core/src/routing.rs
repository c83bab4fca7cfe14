//! Routing contract.
//!
//! The pipeline consumes routing through the [`Router`] trait. A router
//! maps a method and path to a [`RouteMatch`]: the handler descriptor to
//! dispatch plus the named path parameters.
//!
//! [`RouteTable`] is a small reference router that matches literal and
//! `{name}` segments in registration order.
//!
//! # Example
//!
//! ```
//! use meridian_core::{HandlerDescriptor, RouteTable, Router};
//! use http::Method;
//!
//! let table = RouteTable::new()
//!     .route(Method::GET, "/users/{id}", HandlerDescriptor::parse("Users::show").unwrap());
//!
//! let matched = table.match_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.params().get("id"), Some("42"));
//! assert!(table.match_route(&Method::POST, "/users/42").is_err());
//! ```

use crate::dispatch::HandlerDescriptor;
use crate::failure::Failure;
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// Named parameters captured from the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: IndexMap<String, String>,
}

impl PathParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Iterates in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no parameters were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts to a JSON object of strings.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Successful routing result.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    handler: HandlerDescriptor,
    params: PathParams,
    pattern: String,
}

impl RouteMatch {
    /// Creates a route match.
    #[must_use]
    pub fn new(handler: HandlerDescriptor, params: PathParams, pattern: impl Into<String>) -> Self {
        Self {
            handler,
            params,
            pattern: pattern.into(),
        }
    }

    /// Returns the handler descriptor to dispatch.
    #[must_use]
    pub fn handler(&self) -> &HandlerDescriptor {
        &self.handler
    }

    /// Returns the captured path parameters.
    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Returns the route pattern, e.g. `/users/{id}`; used as a metrics label.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Maps requests to handlers.
pub trait Router: Send + Sync + 'static {
    /// Matches a method and path.
    ///
    /// Returns a [`FailureKind::RouteNotFound`](crate::FailureKind::RouteNotFound)
    /// failure when nothing matches.
    fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch, Failure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: Option<Method>,
    pattern: String,
    segments: Vec<Segment>,
    handler: HandlerDescriptor,
}

impl Route {
    fn matches(&self, method: &Method, path: &[&str]) -> Option<PathParams> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }
        if self.segments.len() != path.len() {
            return None;
        }
        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal.as_str() == *part => {}
                Segment::Param(name) if !part.is_empty() => params.insert(name.clone(), *part),
                _ => return None,
            }
        }
        Some(params)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Reference router: first registered matching route wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route restricted to one method.
    #[must_use]
    pub fn route(mut self, method: Method, pattern: &str, handler: HandlerDescriptor) -> Self {
        self.push(Some(method), pattern, handler);
        self
    }

    /// Adds a route matching any method.
    #[must_use]
    pub fn any(mut self, pattern: &str, handler: HandlerDescriptor) -> Self {
        self.push(None, pattern, handler);
        self
    }

    /// Adds a `GET` route.
    #[must_use]
    pub fn get(self, pattern: &str, handler: HandlerDescriptor) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    /// Adds a `POST` route.
    #[must_use]
    pub fn post(self, pattern: &str, handler: HandlerDescriptor) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    fn push(&mut self, method: Option<Method>, pattern: &str, handler: HandlerDescriptor) {
        let segments = split_path(pattern)
            .into_iter()
            .map(|part| {
                part.strip_prefix('{')
                    .and_then(|p| p.strip_suffix('}'))
                    .map_or_else(
                        || Segment::Literal(part.to_string()),
                        |name| Segment::Param(name.to_string()),
                    )
            })
            .collect();
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
        });
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for RouteTable {
    fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch, Failure> {
        let parts = split_path(path);
        self.routes
            .iter()
            .find_map(|route| {
                route.matches(method, &parts).map(|params| {
                    RouteMatch::new(route.handler.clone(), params, route.pattern.clone())
                })
            })
            .ok_or_else(|| {
                debug!(method = %method, path = %path, "No route matched");
                Failure::route_not_found(method, path)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    fn template(name: &str) -> HandlerDescriptor {
        HandlerDescriptor::TemplatePath(name.to_string())
    }

    #[test]
    fn test_literal_and_param() {
        let table = RouteTable::new()
            .get("/", template("home"))
            .get("/users/{id}/posts/{post}", template("post"));

        let root = table.match_route(&Method::GET, "/").unwrap();
        assert!(root.params().is_empty());
        assert_eq!(root.pattern(), "/");

        let matched = table.match_route(&Method::GET, "/users/7/posts/99").unwrap();
        assert_eq!(matched.params().get("id"), Some("7"));
        assert_eq!(matched.params().get("post"), Some("99"));
        assert_eq!(matched.params().to_json(), serde_json::json!({"id": "7", "post": "99"}));
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let table = RouteTable::new().get("/about", template("about"));
        assert!(table.match_route(&Method::GET, "/about/").is_ok());
    }

    #[test]
    fn test_method_filter_and_any() {
        let table = RouteTable::new()
            .post("/orders", template("create"))
            .any("/health", template("health"));

        assert!(table.match_route(&Method::POST, "/orders").is_ok());
        let err = table.match_route(&Method::GET, "/orders").unwrap_err();
        assert_eq!(err.kind(), FailureKind::RouteNotFound);
        assert!(table.match_route(&Method::DELETE, "/health").is_ok());
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new()
            .get("/users/me", template("me"))
            .get("/users/{id}", template("user"));
        let matched = table.match_route(&Method::GET, "/users/me").unwrap();
        assert!(matches!(matched.handler(), HandlerDescriptor::TemplatePath(t) if t == "me"));
    }

    #[test]
    fn test_no_match() {
        let table = RouteTable::new();
        assert!(table.is_empty());
        let err = table.match_route(&Method::GET, "/api/mustFail").unwrap_err();
        assert_eq!(err.kind(), FailureKind::RouteNotFound);
        assert!(err.message().contains("/api/mustFail"));
    }
}
