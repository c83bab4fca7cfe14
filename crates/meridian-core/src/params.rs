//! Multi-valued parameter bags.
//!
//! [`ParamBag`] holds query parameters (and form fields before they are
//! folded into the parsed body). Repeated keys keep every value in arrival
//! order; the single-value accessor returns the first one.
//!
//! [`ServerParams`] holds the transport/environment parameters the server
//! attaches to each request (`REMOTE_ADDR`, `SERVER_PROTOCOL`, ...).

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered, multi-valued string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBag {
    values: IndexMap<String, Vec<String>>,
}

impl ParamBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bag from decoded `(key, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut bag = Self::new();
        for (key, value) in pairs {
            bag.append(key, value);
        }
        bag
    }

    /// Adds a value, keeping earlier values for the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Returns the first value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value for `key`, in arrival order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates over keys and all their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts to a JSON object.
    ///
    /// Single values become strings; repeated keys become arrays.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(key, values)| {
                let value = match values.as_slice() {
                    [single] => Value::String(single.clone()),
                    many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                };
                (key.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

/// Transport and environment parameters of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerParams {
    values: BTreeMap<String, String>,
}

impl ServerParams {
    /// Client address.
    pub const REMOTE_ADDR: &'static str = "REMOTE_ADDR";
    /// Client port.
    pub const REMOTE_PORT: &'static str = "REMOTE_PORT";
    /// Protocol version, e.g. `HTTP/1.1`.
    pub const SERVER_PROTOCOL: &'static str = "SERVER_PROTOCOL";
    /// Unix timestamp the request was received at.
    pub const REQUEST_TIME: &'static str = "REQUEST_TIME";
    /// Server name, from the `Host` header or the bind address.
    pub const SERVER_NAME: &'static str = "SERVER_NAME";

    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a parameter in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterates over all parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_wins() {
        let bag = ParamBag::from_pairs([("tag", "a"), ("tag", "b"), ("page", "2")]);
        assert_eq!(bag.get("tag"), Some("a"));
        assert_eq!(bag.get_all("tag"), ["a", "b"]);
        assert_eq!(bag.get("missing"), None);
        assert!(bag.get_all("missing").is_empty());
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn test_to_json() {
        let bag = ParamBag::from_pairs([("tag", "a"), ("tag", "b"), ("page", "2")]);
        assert_eq!(
            bag.to_json(),
            serde_json::json!({"tag": ["a", "b"], "page": "2"})
        );
    }

    #[test]
    fn test_server_params() {
        let params = ServerParams::new()
            .with(ServerParams::REMOTE_ADDR, "10.0.0.7")
            .with(ServerParams::SERVER_PROTOCOL, "HTTP/1.1");
        assert_eq!(params.get(ServerParams::REMOTE_ADDR), Some("10.0.0.7"));
        assert_eq!(params.iter().count(), 2);
    }
}
