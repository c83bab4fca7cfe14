//! Typed request attributes.
//!
//! Stages communicate through a small, closed set of well-known attribute
//! keys. Application code may add its own attributes under namespaced
//! custom keys (`"namespace.name"`).

use crate::context::RequestContext;
use crate::error::RequestError;
use crate::normalize::HandlerValue;
use crate::routing::RouteMatch;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key of a request attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    /// Result of routing, set by the routing stage.
    Route,
    /// Raw handler return value, set by the dispatch stage.
    HandlerResult,
    /// Per-request context, set by the context stage.
    Context,
    /// Application-defined key.
    Custom(String),
}

impl AttributeKey {
    /// Creates a custom key.
    ///
    /// The name must contain a `.` separating a non-empty namespace from a
    /// non-empty name.
    pub fn custom(name: impl Into<String>) -> Result<Self, RequestError> {
        let name = name.into();
        match name.split_once('.') {
            Some((namespace, rest)) if !namespace.is_empty() && !rest.is_empty() => {
                Ok(Self::Custom(name))
            }
            _ => Err(RequestError::InvalidAttributeKey(name)),
        }
    }

    /// Returns the key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Route => "meridian.route",
            Self::HandlerResult => "meridian.handler_result",
            Self::Context => "meridian.context",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a request attribute.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Routing result.
    Route(Arc<RouteMatch>),
    /// Raw handler return value.
    HandlerResult(Arc<HandlerValue>),
    /// Request context.
    Context(Arc<RequestContext>),
    /// Free-form text.
    Text(String),
    /// Free-form JSON.
    Json(Value),
}

/// Attribute map carried by a request.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: HashMap<AttributeKey, AttributeValue>,
}

impl Attributes {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an attribute.
    #[must_use]
    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// Sets an attribute, replacing any previous value.
    pub fn insert(&mut self, key: AttributeKey, value: AttributeValue) {
        self.entries.insert(key, value);
    }

    /// Removes an attribute.
    pub fn remove(&mut self, key: &AttributeKey) -> Option<AttributeValue> {
        self.entries.remove(key)
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no attributes are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_key_requires_namespace() {
        assert!(AttributeKey::custom("auth.user").is_ok());
        assert!(matches!(
            AttributeKey::custom("user"),
            Err(RequestError::InvalidAttributeKey(_))
        ));
        assert!(AttributeKey::custom(".user").is_err());
        assert!(AttributeKey::custom("auth.").is_err());
    }

    #[test]
    fn test_well_known_names() {
        assert_eq!(AttributeKey::Route.as_str(), "meridian.route");
        assert_eq!(AttributeKey::Context.to_string(), "meridian.context");
    }

    #[test]
    fn test_insert_replace_remove() {
        let key = AttributeKey::custom("app.flag").unwrap();
        let mut attrs = Attributes::new();
        attrs.insert(key.clone(), AttributeValue::Text("a".into()));
        attrs.insert(key.clone(), AttributeValue::Text("b".into()));
        assert_eq!(attrs.len(), 1);
        assert!(matches!(attrs.get(&key), Some(AttributeValue::Text(v)) if v == "b"));
        assert!(attrs.remove(&key).is_some());
        assert!(attrs.is_empty());
    }
}
