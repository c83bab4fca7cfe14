//! Request adaptation.
//!
//! Fills in the parts of a [`Request`] the transport leaves raw:
//!
//! - query parameters, decoded with `serde_urlencoded`;
//! - cookies from every `Cookie` header, first occurrence wins;
//! - the parsed body, by `Content-Type`:
//!   - `application/json` and `+json` types are parsed as JSON; a malformed
//!     document leaves the parsed body empty;
//!   - `application/x-www-form-urlencoded` becomes a JSON object of fields;
//!   - `multipart/form-data` splits into text fields (parsed body) and file
//!     fields (uploaded files). A malformed multipart body fails with 400.
//!
//! A body above the configured limit fails with 413.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use bytes::Bytes;
use futures_util::stream;
use http::header::{CONTENT_TYPE, COOKIE};
use http::StatusCode;
use meridian_core::{
    BoxFuture, Failure, HttpProblem, ParamBag, Request, Response, UploadedFile, UploadedFiles,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use tracing::debug;

/// Default request body limit: 2 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Middleware that parses query, cookies and body.
#[derive(Debug, Clone)]
pub struct RequestAdapterMiddleware {
    max_body_bytes: usize,
}

impl Default for RequestAdapterMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl RequestAdapterMiddleware {
    /// Creates an adapter accepting bodies up to `max_body_bytes`.
    #[must_use]
    pub const fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Returns the body limit.
    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Parses the raw parts of `request`.
    ///
    /// # Errors
    ///
    /// Fails with 413 when the body is over the limit and with 400 when a
    /// multipart body cannot be parsed.
    pub async fn adapt(&self, request: Request) -> Result<Request, Failure> {
        let body_len = request.body().len();
        if body_len > self.max_body_bytes {
            return Err(Failure::http(
                HttpProblem::new(StatusCode::PAYLOAD_TOO_LARGE).with_detail(format!(
                    "Request body of {body_len} bytes exceeds the limit of {} bytes",
                    self.max_body_bytes
                )),
            ));
        }

        let query = parse_query(request.uri().query().unwrap_or_default());
        let cookies = parse_cookies(&request.header_values(COOKIE.as_str()));
        let request = request.with_query_params(query).with_cookies(cookies);

        let Some(content_type) = request.header(CONTENT_TYPE.as_str()) else {
            return Ok(request);
        };
        let Ok(mime) = content_type.parse::<mime::Mime>() else {
            debug!(content_type = %content_type, "Unparseable Content-Type, body left raw");
            return Ok(request);
        };

        if is_json(&mime) {
            let parsed = parse_json(request.body());
            return Ok(request.with_parsed_body(parsed));
        }

        if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
            let parsed = parse_form(request.body());
            return Ok(request.with_parsed_body(parsed));
        }

        if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            let (fields, files) = parse_multipart(content_type, request.body().clone()).await?;
            return Ok(request
                .with_parsed_body(Some(fields))
                .with_uploaded_files(files));
        }

        Ok(request)
    }
}

impl Middleware for RequestAdapterMiddleware {
    fn name(&self) -> &'static str {
        "request_adapter"
    }

    fn stage(&self) -> Stage {
        Stage::Adapt
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            let request = self.adapt(request).await?;
            next.run(request).await
        })
    }
}

fn is_json(mime: &mime::Mime) -> bool {
    mime.type_() == mime::APPLICATION
        && (mime.subtype() == mime::JSON || mime.suffix().is_some_and(|suffix| suffix == mime::JSON))
}

fn parse_query(query: &str) -> ParamBag {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => ParamBag::from_pairs(pairs),
        Err(e) => {
            debug!(error = %e, "Malformed query string ignored");
            ParamBag::new()
        }
    }
}

fn parse_cookies(headers: &[&str]) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for pair in headers.iter().flat_map(|header| header.split(';')) {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
    cookies
}

fn parse_json(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Malformed JSON body, parsed body left empty");
            None
        }
    }
}

fn parse_form(body: &Bytes) -> Option<Value> {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(pairs) => Some(ParamBag::from_pairs(pairs).to_json()),
        Err(e) => {
            debug!(error = %e, "Malformed form body, parsed body left empty");
            None
        }
    }
}

fn bad_multipart(detail: impl Into<String>) -> Failure {
    Failure::http(HttpProblem::new(StatusCode::BAD_REQUEST).with_detail(detail))
}

async fn parse_multipart(
    content_type: &str,
    body: Bytes,
) -> Result<(Value, UploadedFiles), Failure> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| bad_multipart("Missing or invalid multipart boundary").with_source(e))?;

    let body_stream = stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut fields = ParamBag::new();
    let mut files = UploadedFiles::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_multipart("Malformed multipart body").with_source(e))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            debug!("Skipping multipart field without a name");
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(ToString::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_multipart("Malformed multipart file field").with_source(e))?;
            files.insert(&name, UploadedFile::new(Some(file_name), content_type, data));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| bad_multipart("Malformed multipart text field").with_source(e))?;
            fields.append(name, text);
        }
    }

    Ok((fields.to_json(), files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::FailureKind;
    use serde_json::json;

    const BOUNDARY: &str = "X-MERIDIAN-BOUNDARY";

    fn multipart_body() -> String {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             Quarterly\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             alpha\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"docs[]\"; filename=\"b.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             b,e,t,a\r\n\
             --{BOUNDARY}--\r\n"
        )
    }

    #[tokio::test]
    async fn test_query_and_cookies() {
        let request = Request::builder()
            .uri("/search?q=rust+lang&tag=a&tag=b")
            .header("Cookie", "session=abc; theme=\"dark\"")
            .header("Cookie", "session=ignored; lang=en")
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert_eq!(adapted.query("q"), Some("rust lang"));
        assert_eq!(adapted.query_all("tag"), ["a", "b"]);
        assert_eq!(adapted.cookie("session"), Some("abc"));
        assert_eq!(adapted.cookie("theme"), Some("dark"));
        assert_eq!(adapted.cookie("lang"), Some("en"));
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/api/items")
            .header("Content-Type", "application/problem+json")
            .body(r#"{"name":"widget","qty":3}"#)
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert_eq!(adapted.post("name"), Some(&json!("widget")));
        assert_eq!(adapted.post("qty"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_malformed_json_leaves_body_empty() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/api/items")
            .header("Content-Type", "application/json; charset=utf-8")
            .body("{not json")
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert!(adapted.parsed_body().is_none());
    }

    #[tokio::test]
    async fn test_urlencoded_form() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/login")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("user=ada&role=admin&role=ops")
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert_eq!(
            adapted.parsed_body(),
            Some(&json!({"user": "ada", "role": ["admin", "ops"]}))
        );
    }

    #[tokio::test]
    async fn test_multipart_files_and_fields() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body())
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert_eq!(adapted.post("title"), Some(&json!("Quarterly")));

        let first = adapted.file("docs[0]").unwrap();
        assert_eq!(first.file_name(), Some("a.txt"));
        assert_eq!(first.content_type(), Some("text/plain"));
        assert_eq!(first.data(), &Bytes::from("alpha"));
        assert_eq!(adapted.file("docs[1]").unwrap().extension(), Some("csv"));
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_bad_request() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/upload")
            .header("Content-Type", "multipart/form-data")
            .body("garbage")
            .build()
            .unwrap();

        let failure = RequestAdapterMiddleware::default()
            .adapt(request)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Http);
        assert_eq!(
            failure.http_problem().unwrap().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .method(http::Method::POST)
            .uri("/upload")
            .body(vec![b'x'; 64])
            .build()
            .unwrap();

        let failure = RequestAdapterMiddleware::new(16)
            .adapt(request)
            .await
            .unwrap_err();
        assert_eq!(
            failure.http_problem().unwrap().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_unknown_content_type_left_raw() {
        let request = Request::builder()
            .method(http::Method::PUT)
            .uri("/blob")
            .header("Content-Type", "application/octet-stream")
            .body("raw")
            .build()
            .unwrap();

        let adapted = RequestAdapterMiddleware::default().adapt(request).await.unwrap();
        assert!(adapted.parsed_body().is_none());
        assert_eq!(adapted.body(), &Bytes::from("raw"));
    }
}
