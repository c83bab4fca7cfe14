//! Building problem documents from failures.
//!
//! Status resolution, first match wins:
//!
//! 1. HTTP metadata on the failure: type, title, status and context are
//!    copied verbatim.
//! 2. A numeric code in `400..=599`.
//! 3. The failure kind: route not found is 404, dispatch failures are 500,
//!    rate limiting is 429.
//! 4. 500.

use crate::document::{ProblemDocument, ProblemExtensions, DEFAULT_PROBLEM_TYPE};
use crate::sanitizer::Sanitizer;
use http::{HeaderMap, StatusCode};
use meridian_config::AppSettings;
use meridian_core::{ContentNegotiator, Failure, FailureCode, FailureKind, Request};
use serde_json::Map;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::{error, warn};

/// Timestamp format of problem documents.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Creates [`ProblemDocument`]s.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use meridian_config::AppSettings;
/// use meridian_core::{Failure, Request};
/// use meridian_problem::ProblemFactory;
/// use http::Method;
///
/// let factory = ProblemFactory::new(Arc::new(AppSettings::new("/srv/app", "dev", true)));
/// let request = Request::builder().uri("/api/mustFail").build().unwrap();
/// let failure = Failure::route_not_found(&Method::GET, "/api/mustFail");
///
/// let document = factory.create(&failure, &request);
/// assert_eq!(document.status().as_u16(), 404);
/// assert_eq!(document.title(), "Not Found");
/// assert!(document.extensions().throwable.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ProblemFactory {
    settings: Arc<AppSettings>,
    negotiator: ContentNegotiator,
    sanitizer: Sanitizer,
}

impl ProblemFactory {
    /// Creates a factory with the default negotiator.
    #[must_use]
    pub fn new(settings: Arc<AppSettings>) -> Self {
        let sanitizer = Sanitizer::from_settings(&settings);
        Self {
            settings,
            negotiator: ContentNegotiator::new(),
            sanitizer,
        }
    }

    /// Uses a specific negotiator to pick the document format.
    #[must_use]
    pub fn with_negotiator(mut self, negotiator: ContentNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Builds the document for a failure raised while handling `request`.
    #[must_use]
    pub fn create(&self, failure: &Failure, request: &Request) -> ProblemDocument {
        self.build(failure, Some(failure), request)
    }

    /// Builds the document for any error; [`Failure`]s are recognised.
    #[must_use]
    pub fn create_from_error(
        &self,
        error: &(dyn StdError + 'static),
        request: &Request,
    ) -> ProblemDocument {
        self.build(error, error.downcast_ref::<Failure>(), request)
    }

    fn build(
        &self,
        error: &(dyn StdError + 'static),
        failure: Option<&Failure>,
        request: &Request,
    ) -> ProblemDocument {
        let debug = self.settings.debug();
        let mut type_url = DEFAULT_PROBLEM_TYPE.to_string();
        let mut title = None;
        let mut context = Map::new();

        let status = match failure.and_then(Failure::http_problem) {
            Some(problem) => {
                type_url = problem.type_url().to_string();
                title = problem.title().map(str::to_string);
                context = problem.context().clone();
                problem.status()
            }
            None => failure.map_or(StatusCode::INTERNAL_SERVER_ERROR, status_for),
        };

        let message = failure.map_or_else(|| error.to_string(), |f| f.message().to_string());
        let detail = if status.is_server_error() && !debug {
            status.canonical_reason().unwrap_or("Internal Server Error").to_string()
        } else {
            self.sanitizer.redact_path(&message)
        };

        let throwable = debug.then(|| self.sanitizer.sanitize(error));

        let extensions = ProblemExtensions {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            environment: self.settings.environment().to_string(),
            debug,
            context,
            throwable,
        };

        self.log(error, failure, status, request);
        meridian_telemetry::metrics::record_problem(status.as_u16());

        ProblemDocument::new(type_url, title, status, detail, extensions)
            .with_instance(request.path())
            .with_format(self.negotiator.resolve(request))
            .with_headers(failure.map_or_else(HeaderMap::new, |f| f.headers().clone()))
    }

    fn log(
        &self,
        error: &(dyn StdError + 'static),
        failure: Option<&Failure>,
        status: StatusCode,
        request: &Request,
    ) {
        let request_id = request
            .context()
            .map(|ctx| ctx.request_id().to_string())
            .unwrap_or_default();
        let kind = failure.map_or("error", Failure::type_name);

        if status.is_server_error() {
            error!(
                request_id = %request_id,
                http.method = %request.method(),
                http.path = %request.path(),
                http.status_code = status.as_u16(),
                failure = kind,
                error = %error,
                "Request failed"
            );
        } else {
            warn!(
                request_id = %request_id,
                http.method = %request.method(),
                http.path = %request.path(),
                http.status_code = status.as_u16(),
                failure = kind,
                error = %error,
                "Request rejected"
            );
        }
    }
}

/// Status for failures without HTTP metadata.
fn status_for(failure: &Failure) -> StatusCode {
    let from_code = match failure.code() {
        Some(FailureCode::Numeric(code)) => u16::try_from(*code)
            .ok()
            .filter(|c| (400..=599).contains(c))
            .and_then(|c| StatusCode::from_u16(c).ok()),
        _ => None,
    };

    from_code.unwrap_or(match failure.kind() {
        FailureKind::RouteNotFound => StatusCode::NOT_FOUND,
        FailureKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        FailureKind::Dispatch | FailureKind::Application | FailureKind::Http => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })
}
