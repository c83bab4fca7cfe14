//! Rendering problem documents into responses.
//!
//! The document's negotiated format picks the strategy:
//!
//! - JSON: the serialized wire shape.
//! - HTML: template `error{status}`, then template `error`, then markdown.
//!   Each fallback is logged.
//! - Anything else: markdown, which needs nothing but the document.
//!
//! Headers carried by the document are applied after rendering. They
//! replace same-named rendered headers, except the representation headers
//! (`Content-Type`, `Content-Length`), which belong to the rendered body.

use crate::document::ProblemDocument;
use crate::sanitizer::SafeThrowable;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use meridian_core::{
    ContentType, HandlerValue, Renderer, Response, ResponseExt, ResponseNormalizer,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns a [`ProblemDocument`] into a [`Response`].
#[derive(Clone, Default)]
pub struct ProblemRenderer {
    templates: Option<Arc<dyn Renderer>>,
    normalizer: ResponseNormalizer,
}

impl std::fmt::Debug for ProblemRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProblemRenderer")
            .field("templates", &self.templates.is_some())
            .field("normalizer", &self.normalizer)
            .finish()
    }
}

impl ProblemRenderer {
    /// Creates a renderer without templates; HTML falls back to markdown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `templates` for HTML error pages.
    #[must_use]
    pub fn with_templates(mut self, templates: Arc<dyn Renderer>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Uses a specific normalizer for HTML pages.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Renders the document in its negotiated format.
    #[must_use]
    pub fn render(&self, document: ProblemDocument) -> Response {
        let mut response = match document.format() {
            ContentType::Json => self.render_json(&document),
            ContentType::Html => self.render_html(&document),
            _ => render_markdown(&document),
        };

        let headers = response.headers_mut();
        for name in document.headers().keys() {
            if name == CONTENT_TYPE || name == CONTENT_LENGTH {
                continue;
            }
            headers.remove(name);
            for value in document.headers().get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        response
    }

    fn render_json(&self, document: &ProblemDocument) -> Response {
        match serde_json::to_vec(document) {
            Ok(body) => Response::with_content_type(document.status(), ContentType::Json, body),
            Err(e) => {
                warn!(error = %e, "Problem document serialization failed, rendering markdown");
                render_markdown(document)
            }
        }
    }

    fn render_html(&self, document: &ProblemDocument) -> Response {
        let Some(templates) = &self.templates else {
            debug!("No template renderer configured, rendering markdown");
            return render_markdown(document);
        };

        let vars = document.template_vars();
        let candidates = [format!("error{}", document.status().as_u16()), "error".to_string()];
        for template in &candidates {
            match templates.render(template, &vars) {
                Ok(html) => {
                    let mut response = self
                        .normalizer
                        .normalize_as(ContentType::Html, HandlerValue::Text(html));
                    *response.status_mut() = document.status();
                    return response;
                }
                Err(e) => {
                    warn!(template = %template, error = %e, "Error template failed, trying next fallback");
                }
            }
        }
        render_markdown(document)
    }
}

/// Renders the document as markdown.
#[must_use]
pub fn render_markdown(document: &ProblemDocument) -> Response {
    Response::with_content_type(
        document.status(),
        ContentType::Markdown,
        markdown_body(document),
    )
}

/// Builds the markdown text of a document.
#[must_use]
pub fn markdown_body(document: &ProblemDocument) -> String {
    let extensions = document.extensions();
    let mut lines = vec![
        "# An Error Occurred".to_string(),
        String::new(),
        format!("**{} {}**", document.status().as_u16(), document.title()),
        String::new(),
        format!("- **Type:** {}", document.type_url()),
        format!("- **Detail:** {}", document.detail()),
        format!("- **Instance:** {}", document.instance().unwrap_or("-")),
        String::new(),
        "## Environment".to_string(),
        String::new(),
        format!("- **Environment:** {}", extensions.environment),
        format!("- **Debug:** {}", extensions.debug),
        format!("- **Timestamp:** {}", extensions.timestamp),
    ];

    if !extensions.context.is_empty() {
        let context = serde_json::to_string_pretty(&extensions.context)
            .unwrap_or_else(|_| "{}".to_string());
        lines.extend([
            String::new(),
            "## Context".to_string(),
            String::new(),
            "```json".to_string(),
            context,
            "```".to_string(),
        ]);
    }

    if extensions.debug {
        if let Some(throwable) = &extensions.throwable {
            lines.extend([String::new(), "## Throwable".to_string()]);
            for (depth, level) in throwable.chain().enumerate() {
                lines.push(String::new());
                if depth == 0 {
                    lines.push(format!("### {}", level.type_name()));
                } else {
                    lines.push(format!("### Caused by: {}", level.type_name()));
                }
                lines.push(String::new());
                throwable_lines(level, &mut lines);
            }
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn throwable_lines(level: &SafeThrowable, lines: &mut Vec<String>) {
    lines.push(format!("- **Code:** {}", level.code()));
    lines.push(format!("- **Message:** {}", level.message()));
    if let (Some(file), Some(line)) = (level.file(), level.line()) {
        lines.push(format!("- **Location:** {file}:{line}"));
    }
    if level.trace().is_empty() {
        return;
    }
    lines.push(String::new());
    for (index, frame) in level.trace().iter().enumerate() {
        let location = match (frame.file(), frame.line()) {
            (Some(file), Some(line)) => format!(" at {file}:{line}"),
            (Some(file), None) => format!(" at {file}"),
            _ => String::new(),
        };
        let args = if frame.args().is_empty() {
            String::new()
        } else {
            let rendered: Vec<String> = frame.args().iter().map(ToString::to_string).collect();
            format!(" ({})", rendered.join(", "))
        };
        lines.push(format!("{}. `{}`{location}{args}", index + 1, frame.function()));
    }
}
