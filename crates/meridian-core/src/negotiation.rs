//! Content negotiation.
//!
//! [`ContentNegotiator::resolve`] decides which representation a caller
//! wants. Signals are checked in order and the first decisive one wins:
//!
//! 1. A recognised file extension on the URI path (`/report.csv`).
//! 2. The API prefix: the path is exactly `/api` or starts with `/api/`.
//! 3. `X-Requested-With: XMLHttpRequest`.
//! 4. The `Accept` header, by descending `q` weight. Only JSON, HTML and
//!    plain text are eligible; wildcards never match.
//!
//! When nothing decides, the result is HTML.
//!
//! # Example
//!
//! ```
//! use meridian_core::{ContentNegotiator, ContentType, Request};
//!
//! let negotiator = ContentNegotiator::new();
//! let request = Request::builder()
//!     .uri("/dashboard")
//!     .header("Accept", "text/plain;q=0.5, text/html;q=0.9")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(negotiator.resolve(&request), ContentType::Html);
//! assert_eq!(negotiator.preferred_format(&request), "html");
//! ```

use crate::content_type::ContentType;
use crate::request::Request;
use http::header::ACCEPT;
use std::cmp::Ordering;

/// Formats the `Accept` header may select.
pub const SUPPORTED_FORMATS: [ContentType; 3] =
    [ContentType::Json, ContentType::Html, ContentType::Plain];

/// Default API path prefix.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptCandidate {
    /// The media range, lowercased, without parameters.
    pub media_range: String,
    /// The `q` weight; 1.0 when absent, 0.0 when malformed.
    pub weight: f32,
}

/// Resolves the preferred representation of a request.
#[derive(Debug, Clone)]
pub struct ContentNegotiator {
    api_prefix: String,
}

impl Default for ContentNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentNegotiator {
    /// Creates a negotiator with the `/api` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    /// Sets the API path prefix. Trailing slashes are ignored; an empty
    /// prefix disables the API rule.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the configured API prefix.
    #[must_use]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Resolves the content type the request prefers.
    #[must_use]
    pub fn resolve(&self, request: &Request) -> ContentType {
        let path = request.path();

        let by_extension = ContentType::from_path(path);
        if !by_extension.is_default() {
            return by_extension;
        }

        if self.is_api_path(path) || request.is_xhr() {
            return ContentType::Json;
        }

        let accept = request.header_values(ACCEPT.as_str()).join(",");
        select_from_accept(&accept).unwrap_or(ContentType::Html)
    }

    /// Returns the subtype of the resolved content type, e.g. `"json"`.
    #[must_use]
    pub fn preferred_format(&self, request: &Request) -> &'static str {
        self.resolve(request).sub_type()
    }

    fn is_api_path(&self, path: &str) -> bool {
        if self.api_prefix.is_empty() {
            return false;
        }
        path.strip_prefix(self.api_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Parses an `Accept` header into candidates sorted by descending weight.
///
/// The sort is stable, so equal weights keep their listed order.
#[must_use]
pub fn parse_accept(header: &str) -> Vec<AcceptCandidate> {
    let mut candidates: Vec<AcceptCandidate> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media_range = parts.next()?.trim().to_ascii_lowercase();
            if media_range.is_empty() {
                return None;
            }
            let weight = parts
                .filter_map(|param| param.split_once('='))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
                .map_or(1.0, |(_, value)| parse_weight(value));
            Some(AcceptCandidate {
                media_range,
                weight,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
    candidates
}

fn parse_weight(value: &str) -> f32 {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
        .unwrap_or(0.0)
}

fn select_from_accept(header: &str) -> Option<ContentType> {
    parse_accept(header)
        .into_iter()
        .filter(|candidate| candidate.weight > 0.0)
        .find_map(|candidate| {
            ContentType::from_mime(&candidate.media_range)
                .filter(|ct| SUPPORTED_FORMATS.contains(ct))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request {
        headers
            .iter()
            .fold(Request::builder().uri(uri), |b, (k, v)| b.header(*k, *v))
            .build()
            .unwrap()
    }

    fn resolve(uri: &str, headers: &[(&str, &str)]) -> ContentType {
        ContentNegotiator::new().resolve(&request(uri, headers))
    }

    #[test]
    fn test_accept_json() {
        assert_eq!(
            resolve("/users", &[("Accept", "application/json")]),
            ContentType::Json
        );
    }

    #[test]
    fn test_api_prefix_wins_over_accept() {
        assert_eq!(
            resolve("/api/anything", &[("Accept", "text/html")]),
            ContentType::Json
        );
        assert_eq!(resolve("/api", &[]), ContentType::Json);
        assert_eq!(resolve("/apiary", &[]), ContentType::Html);
    }

    #[test]
    fn test_extension_wins_over_everything() {
        assert_eq!(
            resolve("/api/report.csv", &[("Accept", "application/json")]),
            ContentType::Csv
        );
        assert_eq!(resolve("/export.md", &[]), ContentType::Markdown);
    }

    #[test]
    fn test_unknown_extension_falls_through() {
        assert_eq!(
            resolve("/download.exe", &[("Accept", "text/plain")]),
            ContentType::Plain
        );
    }

    #[test]
    fn test_xhr() {
        assert_eq!(
            resolve("/widgets", &[("X-Requested-With", "XMLHttpRequest")]),
            ContentType::Json
        );
    }

    #[test]
    fn test_highest_weight_wins() {
        assert_eq!(
            resolve("/", &[("Accept", "text/plain;q=0.5, text/html;q=0.9")]),
            ContentType::Html
        );
    }

    #[test]
    fn test_ties_keep_listed_order() {
        assert_eq!(
            resolve("/", &[("Accept", "text/plain, application/json")]),
            ContentType::Plain
        );
    }

    #[test]
    fn test_wildcards_and_zero_weight() {
        assert_eq!(resolve("/", &[("Accept", "*/*")]), ContentType::Html);
        assert_eq!(resolve("/", &[("Accept", "text/*")]), ContentType::Html);
        assert_eq!(
            resolve("/", &[("Accept", "application/json;q=0, text/plain;q=0.1")]),
            ContentType::Plain
        );
        assert_eq!(
            resolve("/", &[("Accept", "application/json;q=0")]),
            ContentType::Html
        );
    }

    #[test]
    fn test_absent_or_empty_accept() {
        assert_eq!(resolve("/", &[]), ContentType::Html);
        assert_eq!(resolve("/", &[("Accept", "")]), ContentType::Html);
        assert_eq!(resolve("/", &[("Accept", "image/png")]), ContentType::Html);
    }

    #[test]
    fn test_malformed_weight_counts_as_zero() {
        let parsed = parse_accept("application/json;q=abc, text/plain;q=0.2");
        assert_eq!(parsed[0].media_range, "text/plain");
        assert!((parsed[1].weight - 0.0).abs() < f32::EPSILON);
        assert_eq!(
            resolve("/", &[("Accept", "application/json;q=abc")]),
            ContentType::Html
        );
    }

    #[test]
    fn test_multiple_accept_headers_combined() {
        assert_eq!(
            resolve(
                "/",
                &[("Accept", "image/webp"), ("Accept", "application/json;q=0.8")]
            ),
            ContentType::Json
        );
    }

    #[test]
    fn test_custom_prefix() {
        let negotiator = ContentNegotiator::new().with_api_prefix("/rest/");
        assert_eq!(negotiator.api_prefix(), "/rest");
        assert_eq!(negotiator.resolve(&request("/rest/v1", &[])), ContentType::Json);
        assert_eq!(negotiator.resolve(&request("/api/v1", &[])), ContentType::Html);

        let disabled = ContentNegotiator::new().with_api_prefix("");
        assert_eq!(disabled.resolve(&request("/api/v1", &[])), ContentType::Html);
    }

    #[test]
    fn test_preferred_format() {
        let negotiator = ContentNegotiator::new();
        assert_eq!(negotiator.preferred_format(&request("/api/x", &[])), "json");
        assert_eq!(negotiator.preferred_format(&request("/x", &[])), "html");
    }

    proptest! {
        #[test]
        fn prop_api_paths_are_json(segment in "[a-z0-9]{1,12}", accept in "[ -~]{0,40}") {
            let req = Request::builder()
                .uri(format!("/api/{segment}"))
                .header("Accept", accept.trim())
                .build()
                .unwrap();
            prop_assert_eq!(ContentNegotiator::new().resolve(&req), ContentType::Json);
        }

        #[test]
        fn prop_accept_only_selects_supported(accept in "[ -~]{0,60}") {
            let req = Request::builder()
                .uri("/page")
                .header("Accept", accept.trim())
                .build()
                .unwrap();
            let resolved = ContentNegotiator::new().resolve(&req);
            prop_assert!(SUPPORTED_FORMATS.contains(&resolved));
        }
    }
}
