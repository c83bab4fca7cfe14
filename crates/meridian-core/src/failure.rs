//! Failure taxonomy for the request pipeline.
//!
//! Every stage returns `Result<Response, Failure>` and propagates with `?`.
//! Only the kernel turns a [`Failure`] into a response, through the problem
//! document factory.
//!
//! A `Failure` carries more than a message: an optional machine code, the
//! source location it was raised at, a call trace, HTTP metadata for
//! self-describing failures, response headers (e.g. `Retry-After`) and an
//! optional causing error. The cause chain is walked with
//! [`std::error::Error::source`].
//!
//! # Example
//!
//! ```
//! use meridian_core::{Failure, FailureKind};
//! use http::Method;
//!
//! let failure = Failure::route_not_found(&Method::GET, "/missing");
//! assert_eq!(failure.kind(), FailureKind::RouteNotFound);
//! assert!(failure.message().contains("/missing"));
//! ```

use http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use http::{HeaderMap, Method, StatusCode};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::OnceLock;

/// Result type alias using [`Failure`].
pub type FailureResult<T> = Result<T, Failure>;

/// Boxed error usable as the cause of a failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Upper bound on frames parsed from a captured backtrace.
const MAX_BACKTRACE_FRAMES: usize = 64;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No route matched the request.
    RouteNotFound,
    /// The handler descriptor could not be dispatched or the invocation failed.
    Dispatch,
    /// The caller exceeded a rate limit.
    RateLimited,
    /// Any other application failure.
    Application,
    /// A self-describing failure carrying its own [`HttpProblem`].
    Http,
}

impl FailureKind {
    /// Returns the kind name used as the failure type name.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::RouteNotFound => "RouteNotFound",
            Self::Dispatch => "DispatchFailure",
            Self::RateLimited => "RateLimited",
            Self::Application => "ApplicationFailure",
            Self::Http => "HttpFailure",
        }
    }
}

/// A machine code attached to a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum FailureCode {
    /// Integer code, e.g. a vendor error number or an HTTP status.
    Numeric(i64),
    /// Symbolic code, e.g. an SQLSTATE like `"23000"` kept as text.
    Text(String),
}

impl From<i64> for FailureCode {
    fn from(code: i64) -> Self {
        Self::Numeric(code)
    }
}

impl From<u16> for FailureCode {
    fn from(code: u16) -> Self {
        Self::Numeric(i64::from(code))
    }
}

impl From<&str> for FailureCode {
    fn from(code: &str) -> Self {
        Self::Text(code.to_string())
    }
}

impl From<String> for FailureCode {
    fn from(code: String) -> Self {
        Self::Text(code)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Source location a failure was raised at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureLocation {
    /// Source file path.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl FailureLocation {
    #[track_caller]
    fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

/// One frame of a failure's call trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceFrame {
    /// Function or method name.
    pub function: String,
    /// Source file, when known.
    pub file: Option<String>,
    /// Source line, when known.
    pub line: Option<u32>,
    /// Arguments the function was called with.
    pub args: Vec<Value>,
}

impl TraceFrame {
    /// Creates a frame for a function with no location or arguments.
    #[must_use]
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
            args: Vec::new(),
        }
    }

    /// Sets the source location of the frame.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Sets the frame arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// HTTP metadata of a self-describing failure.
///
/// When present, the problem factory copies type, title, status and context
/// verbatim into the problem document.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpProblem {
    type_url: String,
    title: Option<String>,
    status: StatusCode,
    detail: Option<String>,
    context: Map<String, Value>,
}

impl HttpProblem {
    /// Creates HTTP metadata for a status, with type `about:blank`.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            type_url: "about:blank".to_string(),
            title: None,
            status,
            detail: None,
            context: Map::new(),
        }
    }

    /// Sets the problem type URI.
    #[must_use]
    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    /// Sets the problem title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the human-readable detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Adds an entry to the problem context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns the problem type URI.
    #[must_use]
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Returns the title, if one was set.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the detail, if one was set.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the context map.
    #[must_use]
    pub const fn context(&self) -> &Map<String, Value> {
        &self.context
    }
}

/// Where the causal chain continues after this failure.
#[derive(Debug)]
enum Cause {
    /// An error that caused this failure; it is the next chain level.
    Source(BoxError),
    /// The error this failure was converted from; its own source is the next
    /// chain level.
    Wrapped(BoxError),
}

/// A failure raised inside the request pipeline.
#[derive(Debug)]
pub struct Failure {
    kind: FailureKind,
    type_name: String,
    message: String,
    code: Option<FailureCode>,
    location: FailureLocation,
    trace: Vec<TraceFrame>,
    http: Option<HttpProblem>,
    headers: HeaderMap,
    cause: Option<Cause>,
}

impl Failure {
    #[track_caller]
    fn build(kind: FailureKind, message: String) -> Self {
        Self {
            kind,
            type_name: kind.type_name().to_string(),
            message,
            code: None,
            location: FailureLocation::caller(),
            trace: Vec::new(),
            http: None,
            headers: HeaderMap::new(),
            cause: None,
        }
    }

    /// No route matched `method` and `path`.
    #[must_use]
    #[track_caller]
    pub fn route_not_found(method: &Method, path: &str) -> Self {
        Self::build(
            FailureKind::RouteNotFound,
            format!("No route found for {method} {path}"),
        )
    }

    /// The handler could not be dispatched.
    #[must_use]
    #[track_caller]
    pub fn dispatch(reason: impl Into<String>) -> Self {
        Self::build(FailureKind::Dispatch, reason.into())
    }

    /// The caller is rate limited; sets a `Retry-After` header.
    #[must_use]
    #[track_caller]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        let mut failure = Self::build(
            FailureKind::RateLimited,
            format!("Too many requests, retry after {retry_after_secs} seconds"),
        );
        failure
            .headers
            .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        failure
    }

    /// A generic application failure.
    #[must_use]
    #[track_caller]
    pub fn application(message: impl Into<String>) -> Self {
        Self::build(FailureKind::Application, message.into())
    }

    /// A self-describing failure with HTTP metadata.
    #[must_use]
    #[track_caller]
    pub fn http(problem: HttpProblem) -> Self {
        let message = problem
            .detail()
            .or_else(|| problem.title())
            .or_else(|| problem.status().canonical_reason())
            .unwrap_or("HTTP failure")
            .to_string();
        let mut failure = Self::build(FailureKind::Http, message);
        failure.http = Some(problem);
        failure
    }

    /// Converts any error into a failure.
    ///
    /// A [`Failure`] passed in is returned unchanged. Any other error becomes
    /// an application failure named after the error type, whose chain
    /// continues with the error's own source.
    #[must_use]
    #[track_caller]
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let boxed: BoxError = Box::new(err);
        match boxed.downcast::<Self>() {
            Ok(failure) => *failure,
            Err(other) => {
                let mut failure = Self::build(FailureKind::Application, other.to_string());
                failure.type_name = short_type_name(std::any::type_name::<E>());
                failure.cause = Some(Cause::Wrapped(other));
                failure
            }
        }
    }

    /// Attaches a machine code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<FailureCode>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attaches the error that caused this failure.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.cause = Some(Cause::Source(source.into()));
        self
    }

    /// Overrides the type name shown in diagnostics.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Appends a response header, keeping existing values.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends a frame to the call trace.
    #[must_use]
    pub fn with_frame(mut self, frame: TraceFrame) -> Self {
        self.trace.push(frame);
        self
    }

    /// Captures the current backtrace and appends its frames to the trace.
    #[must_use]
    pub fn with_backtrace(mut self) -> Self {
        let rendered = Backtrace::force_capture().to_string();
        self.trace.extend(parse_backtrace(&rendered));
        self
    }

    /// Returns the failure kind.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns the type name shown in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the machine code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&FailureCode> {
        self.code.as_ref()
    }

    /// Returns where the failure was raised.
    #[must_use]
    pub const fn location(&self) -> &FailureLocation {
        &self.location
    }

    /// Returns the recorded call trace.
    #[must_use]
    pub fn trace(&self) -> &[TraceFrame] {
        &self.trace
    }

    /// Returns the HTTP metadata of a self-describing failure.
    #[must_use]
    pub const fn http_problem(&self) -> Option<&HttpProblem> {
        self.http.as_ref()
    }

    /// Returns the headers to add to the error response.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(Cause::Source(err)) => Some(err.as_ref()),
            Some(Cause::Wrapped(err)) => err.source(),
            None => None,
        }
    }
}

/// Strips module paths from a type name, keeping generics readable.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\d+:\s+(?P<function>.+?)\s*$").expect("valid regex")
    })
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*at\s+(?P<file>.+?):(?P<line>\d+)(?::\d+)?\s*$").expect("valid regex")
    })
}

/// Parses the `Display` form of a [`Backtrace`] into frames.
///
/// Each numbered line opens a frame; a following `at file:line:col` line
/// sets its location.
pub fn parse_backtrace(rendered: &str) -> Vec<TraceFrame> {
    let mut frames: Vec<TraceFrame> = Vec::new();
    for line in rendered.lines() {
        if let Some(caps) = frame_pattern().captures(line) {
            if frames.len() == MAX_BACKTRACE_FRAMES {
                break;
            }
            frames.push(TraceFrame::new(&caps["function"]));
        } else if let Some(caps) = location_pattern().captures(line) {
            if let Some(frame) = frames.last_mut() {
                frame.file = Some(caps["file"].to_string());
                frame.line = caps["line"].parse().ok();
            }
        }
    }
    frames
}
