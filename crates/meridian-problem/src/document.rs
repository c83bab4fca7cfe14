//! The RFC 7807 problem document.

use crate::sanitizer::SafeThrowable;
use http::{HeaderMap, StatusCode};
use meridian_core::ContentType;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Type URI used when a problem has no specific type.
pub const DEFAULT_PROBLEM_TYPE: &str = "about:blank";

/// Title for a status: its reason phrase.
#[must_use]
pub fn status_title(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown Status").to_string()
}

/// Non-standard members of a problem document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemExtensions {
    /// Creation time, `YYYY-MM-DDTHH:MM:SS+HH:MM`.
    pub timestamp: String,
    /// Environment name.
    pub environment: String,
    /// Whether debug output was enabled.
    pub debug: bool,
    /// Problem-specific context.
    pub context: Map<String, Value>,
    /// Sanitized failure chain; only set in debug mode.
    pub throwable: Option<SafeThrowable>,
}

/// A structured error payload.
///
/// Serializes to the wire shape
/// `{type, title, status, detail, instance, extensions}`. The negotiated
/// format and the response headers travel with the document but are not
/// serialized.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDocument {
    #[serde(rename = "type")]
    type_url: String,
    title: String,
    #[serde(serialize_with = "serialize_status")]
    status: StatusCode,
    detail: String,
    instance: Option<String>,
    extensions: ProblemExtensions,
    #[serde(skip)]
    format: ContentType,
    #[serde(skip)]
    headers: HeaderMap,
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

impl ProblemDocument {
    /// Creates a document.
    ///
    /// With the default type, or without a title, the title is the status
    /// reason phrase.
    #[must_use]
    pub fn new(
        type_url: impl Into<String>,
        title: Option<String>,
        status: StatusCode,
        detail: impl Into<String>,
        extensions: ProblemExtensions,
    ) -> Self {
        let type_url = type_url.into();
        let type_url = if type_url.is_empty() {
            DEFAULT_PROBLEM_TYPE.to_string()
        } else {
            type_url
        };
        let title = match title {
            Some(title) if type_url != DEFAULT_PROBLEM_TYPE && !title.is_empty() => title,
            _ => status_title(status),
        };
        Self {
            type_url,
            title,
            status,
            detail: detail.into(),
            instance: None,
            extensions,
            format: ContentType::Json,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the instance (the request path).
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Sets the format the document is rendered in.
    #[must_use]
    pub fn with_format(mut self, format: ContentType) -> Self {
        self.format = format;
        self
    }

    /// Sets the response headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the problem type URI.
    #[must_use]
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the instance.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Returns the extensions.
    #[must_use]
    pub const fn extensions(&self) -> &ProblemExtensions {
        &self.extensions
    }

    /// Returns the negotiated format.
    #[must_use]
    pub const fn format(&self) -> ContentType {
        self.format
    }

    /// Returns the headers to apply to the response.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the variables passed to HTML error templates.
    #[must_use]
    pub fn template_vars(&self) -> Value {
        let mut vars = Map::new();
        vars.insert("status".into(), Value::from(self.status.as_u16()));
        vars.insert("title".into(), Value::from(self.title.clone()));
        vars.insert("detail".into(), Value::from(self.detail.clone()));
        vars.insert("type".into(), Value::from(self.type_url.clone()));
        vars.insert(
            "instance".into(),
            self.instance.clone().map_or(Value::Null, Value::from),
        );
        vars.insert(
            "environment".into(),
            Value::from(self.extensions.environment.clone()),
        );
        vars.insert("debug".into(), Value::from(self.extensions.debug));
        vars.insert(
            "timestamp".into(),
            Value::from(self.extensions.timestamp.clone()),
        );
        vars.insert(
            "context".into(),
            Value::Object(self.extensions.context.clone()),
        );
        if self.extensions.debug {
            if let Some(throwable) = &self.extensions.throwable {
                vars.insert(
                    "throwable".into(),
                    serde_json::to_value(throwable).unwrap_or(Value::Null),
                );
            }
        }
        Value::Object(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions(debug: bool) -> ProblemExtensions {
        ProblemExtensions {
            timestamp: "2026-10-17T09:30:00+00:00".to_string(),
            environment: "test".to_string(),
            debug,
            context: Map::new(),
            throwable: None,
        }
    }

    #[test]
    fn test_default_type_uses_reason_phrase() {
        let doc = ProblemDocument::new(
            DEFAULT_PROBLEM_TYPE,
            Some("Custom".to_string()),
            StatusCode::NOT_FOUND,
            "missing",
            extensions(false),
        );
        assert_eq!(doc.title(), "Not Found");
    }

    #[test]
    fn test_typed_problem_keeps_title() {
        let doc = ProblemDocument::new(
            "https://example.com/problems/out-of-stock",
            Some("Out of stock".to_string()),
            StatusCode::CONFLICT,
            "item 7",
            extensions(false),
        );
        assert_eq!(doc.title(), "Out of stock");

        let untitled = ProblemDocument::new(
            "https://example.com/problems/out-of-stock",
            None,
            StatusCode::CONFLICT,
            "item 7",
            extensions(false),
        );
        assert_eq!(untitled.title(), "Conflict");
    }

    #[test]
    fn test_wire_shape() {
        let doc = ProblemDocument::new("", None, StatusCode::NOT_FOUND, "missing", extensions(true))
            .with_instance("/api/x");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "about:blank");
        assert_eq!(value["title"], "Not Found");
        assert_eq!(value["status"], 404);
        assert_eq!(value["detail"], "missing");
        assert_eq!(value["instance"], "/api/x");
        assert_eq!(value["extensions"]["environment"], "test");
        assert_eq!(value["extensions"]["debug"], true);
        assert!(value["extensions"]["context"].is_object());
        assert!(value["extensions"]["throwable"].is_null());
        assert!(value.get("format").is_none());
        assert!(value.get("headers").is_none());
    }

    #[test]
    fn test_template_vars() {
        let doc = ProblemDocument::new("", None, StatusCode::GONE, "bye", extensions(false));
        let vars = doc.template_vars();
        assert_eq!(vars["status"], 410);
        assert_eq!(vars["title"], "Gone");
        assert!(vars["instance"].is_null());
        assert!(vars.get("throwable").is_none());
    }
}
