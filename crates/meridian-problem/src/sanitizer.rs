//! Display-safe snapshots of failures.
//!
//! A [`Sanitizer`] walks an error's causal chain and copies each level into
//! an immutable [`SafeThrowable`]. Two things never reach the snapshot:
//!
//! - the real project root: every occurrence in file paths and messages is
//!   replaced with [`PROJECT_ROOT_PLACEHOLDER`];
//! - raw frame arguments, when redaction is on: each argument becomes a
//!   short type summary such as `"string"` or `"array(3)"`.
//!
//! # Example
//!
//! ```
//! use meridian_core::Failure;
//! use meridian_problem::Sanitizer;
//!
//! let sanitizer = Sanitizer::new("/srv/app", true);
//! let failure = Failure::application("cannot open /srv/app/var/cache");
//! let safe = sanitizer.sanitize(&failure);
//!
//! assert_eq!(safe.message(), "cannot open {PROJECT_ROOT}/var/cache");
//! assert_eq!(safe.code(), 0);
//! ```

use meridian_config::AppSettings;
use meridian_core::{Failure, FailureCode, TraceFrame};
use serde::Serialize;
use serde_json::Value;
use std::error::Error as StdError;
use std::path::Path;

/// Deepest causal chain copied into a snapshot.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Text that replaces the project root.
pub const PROJECT_ROOT_PLACEHOLDER: &str = "{PROJECT_ROOT}";

/// Type name used for chain levels that are not [`Failure`]s.
pub const GENERIC_ERROR_TYPE: &str = "error";

/// One sanitized trace frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeFrame {
    function: String,
    file: Option<String>,
    line: Option<u32>,
    args: Vec<Value>,
}

impl SafeFrame {
    /// Returns the function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Returns the redacted file path.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Returns the line number.
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        self.line
    }

    /// Returns the arguments (summaries when redacted).
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Immutable, display-safe snapshot of a failure and its causes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeThrowable {
    #[serde(rename = "type")]
    type_name: String,
    code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_code: Option<String>,
    message: String,
    file: Option<String>,
    line: Option<u32>,
    trace: Vec<SafeFrame>,
    previous: Option<Box<SafeThrowable>>,
}

impl SafeThrowable {
    /// Returns the failure type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the numeric code; 0 when absent or non-numeric.
    #[must_use]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Returns a non-numeric code as it was raised.
    #[must_use]
    pub fn original_code(&self) -> Option<&str> {
        self.original_code.as_deref()
    }

    /// Returns the sanitized message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the redacted source file.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Returns the source line.
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        self.line
    }

    /// Returns the trace frames.
    #[must_use]
    pub fn trace(&self) -> &[SafeFrame] {
        &self.trace
    }

    /// Returns the cause, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&SafeThrowable> {
        self.previous.as_deref()
    }

    /// Iterates over this level and every cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &SafeThrowable> {
        std::iter::successors(Some(self), |level| level.previous())
    }
}

/// Produces [`SafeThrowable`]s.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    project_root: String,
    redact_arguments: bool,
}

impl Sanitizer {
    /// Creates a sanitizer. An empty root disables path replacement.
    #[must_use]
    pub fn new(project_root: impl AsRef<Path>, redact_arguments: bool) -> Self {
        let root = project_root.as_ref().to_string_lossy();
        Self {
            project_root: root.trim_end_matches(['/', '\\']).to_string(),
            redact_arguments,
        }
    }

    /// Creates a sanitizer from application settings.
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.project_root(), settings.redact_arguments())
    }

    /// Returns whether frame arguments are redacted.
    #[must_use]
    pub const fn redacts_arguments(&self) -> bool {
        self.redact_arguments
    }

    /// Snapshots `error` and up to [`MAX_CHAIN_DEPTH`] levels of its chain.
    #[must_use]
    pub fn sanitize(&self, error: &(dyn StdError + 'static)) -> SafeThrowable {
        let mut head = self.level(error);

        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(cause) = current {
            if causes.len() + 1 >= MAX_CHAIN_DEPTH {
                break;
            }
            causes.push(self.level(cause));
            current = cause.source();
        }

        let mut previous: Option<Box<SafeThrowable>> = None;
        for mut level in causes.into_iter().rev() {
            level.previous = previous;
            previous = Some(Box::new(level));
        }
        head.previous = previous;
        head
    }

    fn level(&self, error: &(dyn StdError + 'static)) -> SafeThrowable {
        match error.downcast_ref::<Failure>() {
            Some(failure) => {
                let (code, original_code) = normalize_code(failure.code());
                let message = match &original_code {
                    Some(text) => format!("{text} - {}", failure.message()),
                    None => failure.message().to_string(),
                };
                SafeThrowable {
                    type_name: failure.type_name().to_string(),
                    code,
                    original_code,
                    message: self.redact_path(&message),
                    file: Some(self.redact_path(&failure.location().file)),
                    line: Some(failure.location().line),
                    trace: failure.trace().iter().map(|f| self.frame(f)).collect(),
                    previous: None,
                }
            }
            None => SafeThrowable {
                type_name: GENERIC_ERROR_TYPE.to_string(),
                code: 0,
                original_code: None,
                message: self.redact_path(&error.to_string()),
                file: None,
                line: None,
                trace: Vec::new(),
                previous: None,
            },
        }
    }

    fn frame(&self, frame: &TraceFrame) -> SafeFrame {
        let args = if self.redact_arguments {
            frame.args.iter().map(|arg| Value::String(summarize(arg))).collect()
        } else {
            frame.args.clone()
        };
        SafeFrame {
            function: frame.function.clone(),
            file: frame.file.as_deref().map(|file| self.redact_path(file)),
            line: frame.line,
            args,
        }
    }

    /// Replaces every occurrence of the project root.
    #[must_use]
    pub fn redact_path(&self, text: &str) -> String {
        if self.project_root.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.project_root, PROJECT_ROOT_PLACEHOLDER)
        }
    }
}

/// Splits a code into its numeric value and, for text codes, the original.
fn normalize_code(code: Option<&FailureCode>) -> (i64, Option<String>) {
    match code {
        Some(FailureCode::Numeric(n)) => (*n, None),
        Some(FailureCode::Text(text)) if !text.is_empty() => (0, Some(text.clone())),
        Some(FailureCode::Text(_)) | None => (0, None),
    }
}

/// Describes a value by its type only.
fn summarize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => "int".to_string(),
        Value::Number(_) => "float".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array({})", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::fmt;
    use std::io;

    #[derive(Debug)]
    struct Layer(usize, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "layer {}", self.0)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_deref().map(|l| l as &(dyn StdError + 'static))
        }
    }

    fn nested(depth: usize) -> Layer {
        (1..depth).fold(Layer(depth - 1, None), |inner, i| {
            Layer(depth - 1 - i, Some(Box::new(inner)))
        })
    }

    #[test]
    fn test_text_code_prefixes_message() {
        let failure = Failure::application("Integrity constraint violation").with_code("23000");
        let safe = Sanitizer::new("", true).sanitize(&failure);
        assert_eq!(safe.code(), 0);
        assert_eq!(safe.original_code(), Some("23000"));
        assert!(safe.message().starts_with("23000 - "));
    }

    #[test]
    fn test_numeric_code_passes_through() {
        let failure = Failure::application("gone").with_code(410_i64);
        let safe = Sanitizer::new("", true).sanitize(&failure);
        assert_eq!(safe.code(), 410);
        assert_eq!(safe.original_code(), None);
        assert_eq!(safe.message(), "gone");
    }

    #[test]
    fn test_paths_redacted() {
        let failure = Failure::application("boom").with_frame(
            TraceFrame::new("orders::create").at("/srv/app/src/orders.rs", 12),
        );
        let safe = Sanitizer::new("/srv/app/", true).sanitize(&failure);
        assert_eq!(safe.trace()[0].file(), Some("{PROJECT_ROOT}/src/orders.rs"));
        assert_eq!(safe.trace()[0].line(), Some(12));
    }

    #[test]
    fn test_location_redacted() {
        let failure = Failure::application("boom");
        let root = env!("CARGO_MANIFEST_DIR");
        let safe = Sanitizer::new("", true).sanitize(&failure);
        assert!(safe.file().unwrap().ends_with("sanitizer.rs"));
        assert!(safe.line().unwrap() > 0);

        let at_root = Sanitizer::new(root, true).sanitize(
            &Failure::application("x").with_frame(TraceFrame::new("f").at(format!("{root}/src/lib.rs"), 1)),
        );
        assert_eq!(at_root.trace()[0].file(), Some("{PROJECT_ROOT}/src/lib.rs"));
    }

    #[test]
    fn test_argument_redaction() {
        let failure = Failure::application("boom").with_frame(TraceFrame::new("f").with_args(vec![
            json!("secret-token"),
            json!(42),
            json!(1.5),
            json!(true),
            json!(null),
            json!([1, 2, 3]),
            json!({"password": "hunter2"}),
        ]));

        let redacted = Sanitizer::new("", true).sanitize(&failure);
        assert_eq!(
            redacted.trace()[0].args(),
            &[
                json!("string"),
                json!("int"),
                json!("float"),
                json!("bool"),
                json!("null"),
                json!("array(3)"),
                json!("object")
            ]
        );

        let raw = Sanitizer::new("", false).sanitize(&failure);
        assert_eq!(raw.trace()[0].args()[0], json!("secret-token"));
    }

    #[test]
    fn test_chain_is_linked() {
        let failure = Failure::dispatch("handler failed")
            .with_source(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        let safe = Sanitizer::new("", true).sanitize(&failure);

        assert_eq!(safe.type_name(), "DispatchFailure");
        let cause = safe.previous().unwrap();
        assert_eq!(cause.type_name(), GENERIC_ERROR_TYPE);
        assert_eq!(cause.message(), "no such file");
        assert!(cause.file().is_none());
        assert_eq!(safe.chain().count(), 2);
    }

    #[test]
    fn test_nested_failures_keep_types() {
        let inner = Failure::application("inner").with_code("E42");
        let outer = Failure::dispatch("outer").with_source(inner);
        let safe = Sanitizer::new("", true).sanitize(&outer);
        let cause = safe.previous().unwrap();
        assert_eq!(cause.type_name(), "ApplicationFailure");
        assert_eq!(cause.message(), "E42 - inner");
    }

    #[test]
    fn test_chain_depth_is_bounded() {
        let deep = nested(100);
        let safe = Sanitizer::new("", true).sanitize(&deep);
        assert_eq!(safe.chain().count(), MAX_CHAIN_DEPTH);
        assert_eq!(safe.message(), "layer 0");

        let shallow = nested(3);
        assert_eq!(Sanitizer::new("", true).sanitize(&shallow).chain().count(), 3);
    }

    #[test]
    fn test_serialized_shape() {
        let safe = Sanitizer::new("", true).sanitize(&Failure::application("x").with_code(7_i64));
        let value = serde_json::to_value(&safe).unwrap();
        assert_eq!(value["type"], "ApplicationFailure");
        assert_eq!(value["code"], 7);
        assert!(value.get("original_code").is_none());
        assert!(value["previous"].is_null());
    }

    proptest! {
        #[test]
        fn prop_project_root_never_leaks(
            root in "/[a-z]{1,8}(/[a-z]{1,8}){0,3}",
            suffix in "(/[a-z]{1,8}){1,3}\\.rs",
            message in "[a-z ]{0,20}",
        ) {
            let path = format!("{root}{suffix}");
            let failure = Failure::application(format!("{message} {path}"))
                .with_frame(TraceFrame::new("f").at(path.clone(), 3))
                .with_source(io::Error::other(format!("reading {path}")));
            let safe = Sanitizer::new(&root, true).sanitize(&failure);

            for level in safe.chain() {
                prop_assert!(!level.message().contains(&root));
                prop_assert!(!level.file().unwrap_or_default().contains(&root));
                for frame in level.trace() {
                    let file = frame.file().unwrap_or_default();
                    prop_assert!(!file.contains(&root));
                    prop_assert!(file.starts_with(PROJECT_ROOT_PLACEHOLDER));
                }
            }
        }
    }
}
