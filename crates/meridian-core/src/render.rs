//! Template rendering contract.
//!
//! The pipeline never interprets templates itself: it asks a [`Renderer`]
//! to turn a template name and a JSON object of variables into text.
//! [`TemplateRegistry`] is an in-memory reference renderer with
//! `{{ name }}` placeholders and HTML escaping.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// No template with this name exists.
    #[error("template '{0}' not found")]
    NotFound(String),

    /// The template exists but could not be rendered.
    #[error("template '{template}' failed to render: {reason}")]
    Failed {
        /// Template name.
        template: String,
        /// What went wrong.
        reason: String,
    },
}

/// Renders named templates.
pub trait Renderer: Send + Sync + 'static {
    /// Renders `template` with `vars` (a JSON object).
    fn render(&self, template: &str, vars: &Value) -> Result<String, RenderError>;
}

/// In-memory templates with `{{ name }}` substitution.
///
/// Placeholders may use dotted paths (`{{ user.name }}`). Strings are
/// inserted as-is after escaping, other values as compact JSON. Missing and
/// null variables render as empty text; an unterminated placeholder is a
/// render failure.
///
/// # Example
///
/// ```
/// use meridian_core::{Renderer, TemplateRegistry};
/// use serde_json::json;
///
/// let registry = TemplateRegistry::new().with_template("hello", "<p>Hi {{ name }}</p>");
/// let html = registry.render("hello", &json!({"name": "<Ada>"})).unwrap();
/// assert_eq!(html, "<p>Hi &lt;Ada&gt;</p>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, String>,
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template, returning the registry.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    /// Returns `true` if a template exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl Renderer for TemplateRegistry {
    fn render(&self, template: &str, vars: &Value) -> Result<String, RenderError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| RenderError::NotFound(template.to_string()))?;

        let mut output = String::with_capacity(source.len());
        let mut rest = source.as_str();
        while let Some(open) = rest.find("{{") {
            output.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| RenderError::Failed {
                template: template.to_string(),
                reason: "unterminated placeholder".to_string(),
            })?;
            let name = after[..close].trim();
            output.push_str(&escape_html(&lookup(vars, name)));
            rest = &after[close + 2..];
        }
        output.push_str(rest);
        Ok(output)
    }
}

fn lookup(vars: &Value, path: &str) -> String {
    let found = path
        .split('.')
        .try_fold(vars, |value, key| value.get(key));
    match found {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Escapes the five HTML-significant characters.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
