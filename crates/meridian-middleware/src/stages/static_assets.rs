//! Static file serving.
//!
//! `GET` and `HEAD` requests whose path names a regular file under the
//! configured root are answered here; everything else is passed on.
//!
//! ## Security
//!
//! - `..` components are never followed
//! - Hidden files (dot-prefixed components) are skipped unless enabled
//! - The canonical path must stay under the canonical root, so symlinks
//!   cannot escape it
//!
//! ## Caching
//!
//! Responses carry `Cache-Control: public, max-age=<n>`, `Last-Modified`
//! and a strong `ETag` built from the modification time and size. A
//! matching `If-None-Match` (or `*`) yields `304 Not Modified` with an
//! empty body.

use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::stages::context::MatchedRoute;
use bytes::Bytes;
use http::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, ETAG, IF_NONE_MATCH, LAST_MODIFIED,
};
use http::{Method, StatusCode};
use meridian_config::StaticAssetsConfig;
use meridian_core::{BoxFuture, ContentType, Failure, Request, Response, ResponseExt};
use meridian_telemetry::metrics::record_static_hit;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Route label recorded for static responses.
pub const STATIC_ROUTE: &str = "static";

/// Middleware that serves files from a directory.
#[derive(Debug, Clone)]
pub struct StaticAssetsMiddleware {
    root: PathBuf,
    max_age_secs: u64,
    serve_hidden: bool,
}

/// A resolved file.
#[derive(Debug)]
struct Asset {
    path: PathBuf,
    metadata: Metadata,
}

impl StaticAssetsMiddleware {
    /// Serves files under `root` with a one hour max-age.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_age_secs: 3600,
            serve_hidden: false,
        }
    }

    /// Builds the middleware from configuration.
    ///
    /// A relative root is resolved against `base` when `base` is not empty.
    #[must_use]
    pub fn from_config(config: &StaticAssetsConfig, base: &Path) -> Self {
        let root = if config.root.is_relative() && !base.as_os_str().is_empty() {
            base.join(&config.root)
        } else {
            config.root.clone()
        };
        Self::new(root)
            .with_max_age(config.max_age_secs)
            .with_serve_hidden(config.serve_hidden)
    }

    /// Sets the `Cache-Control` max-age.
    #[must_use]
    pub const fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Allows serving dot-prefixed files.
    #[must_use]
    pub const fn with_serve_hidden(mut self, serve_hidden: bool) -> Self {
        self.serve_hidden = serve_hidden;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a request path to a file under the root.
    async fn resolve(&self, request_path: &str) -> Option<Asset> {
        let relative = request_path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(name) => {
                    let hidden = name.to_str().is_some_and(|n| n.starts_with('.'));
                    if hidden && !self.serve_hidden {
                        debug!(path = %request_path, "Hidden path not served");
                        return None;
                    }
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    debug!(path = %request_path, "Directory traversal rejected");
                    return None;
                }
            }
        }

        let canonical_root = tokio::fs::canonicalize(&self.root).await.ok()?;
        let canonical = tokio::fs::canonicalize(self.root.join(relative)).await.ok()?;
        if !canonical.starts_with(&canonical_root) {
            debug!(path = %request_path, "Path escapes the static root");
            return None;
        }

        let metadata = tokio::fs::metadata(&canonical).await.ok()?;
        metadata.is_file().then_some(Asset {
            path: canonical,
            metadata,
        })
    }

    fn cache_control(&self) -> HeaderValue {
        HeaderValue::from_str(&format!("public, max-age={}", self.max_age_secs))
            .unwrap_or_else(|_| HeaderValue::from_static("public"))
    }

    async fn serve(&self, request: &Request, asset: Asset) -> Result<Response, Failure> {
        let modified = asset.metadata.modified().ok();
        let etag = generate_etag(&asset.metadata);

        if let Some(etag) = &etag {
            if if_none_match(request, etag) {
                debug!(path = %request.path(), etag = %etag, "Static asset not modified");
                record_static_hit(true);
                let mut response = Response::empty(StatusCode::NOT_MODIFIED);
                self.apply_cache_headers(&mut response, Some(etag.as_str()), modified);
                response.extensions_mut().insert(MatchedRoute::new(STATIC_ROUTE));
                return Ok(response);
            }
        }

        let content_type = ContentType::from_path(&asset.path);
        let body = if request.method() == Method::HEAD {
            Bytes::new()
        } else {
            tokio::fs::read(&asset.path)
                .await
                .map(Bytes::from)
                .map_err(Failure::from_error)?
        };

        let mut response = Response::with_content_type(StatusCode::OK, content_type, body);
        self.apply_cache_headers(&mut response, etag.as_deref(), modified);
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(asset.metadata.len()));
        response.extensions_mut().insert(MatchedRoute::new(STATIC_ROUTE));

        debug!(
            path = %request.path(),
            content_type = %content_type.mime(),
            bytes = asset.metadata.len(),
            "Static asset served"
        );
        record_static_hit(false);
        Ok(response)
    }

    fn apply_cache_headers(
        &self,
        response: &mut Response,
        etag: Option<&str>,
        modified: Option<SystemTime>,
    ) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, self.cache_control());
        if let Some(value) = etag.and_then(|e| HeaderValue::from_str(e).ok()) {
            headers.insert(ETAG, value);
        }
        if let Some(value) = modified
            .map(httpdate::fmt_http_date)
            .and_then(|date| HeaderValue::from_str(&date).ok())
        {
            headers.insert(LAST_MODIFIED, value);
        }
    }
}

impl Middleware for StaticAssetsMiddleware {
    fn name(&self) -> &'static str {
        "static_assets"
    }

    fn stage(&self) -> Stage {
        Stage::StaticAssets
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, Failure>> {
        Box::pin(async move {
            if request.method() != Method::GET && request.method() != Method::HEAD {
                return next.run(request).await;
            }
            match self.resolve(request.path()).await {
                Some(asset) => self.serve(&request, asset).await,
                None => next.run(request).await,
            }
        })
    }
}

/// Builds a strong `ETag` from modification time and size.
fn generate_etag(metadata: &Metadata) -> Option<String> {
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(format!(
        "\"{:x}-{:x}-{:x}\"",
        since_epoch.as_secs(),
        since_epoch.subsec_nanos(),
        metadata.len()
    ))
}

fn if_none_match(request: &Request, etag: &str) -> bool {
    request
        .header_values(IF_NONE_MATCH.as_str())
        .iter()
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use crate::pipeline::Pipeline;
    use http::header::CONTENT_TYPE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        fallthrough: Arc<AtomicUsize>,
        pipeline: Pipeline,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.css"), "body { color: red; }").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let fallthrough = Arc::new(AtomicUsize::new(0));
        let counter = fallthrough.clone();
        let pipeline = Pipeline::builder()
            .stage(StaticAssetsMiddleware::new(dir.path()).with_max_age(600))
            .stage(FnMiddleware::new("fallback", Stage::Normalization, move |_request, _next| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(Response::text(StatusCode::NOT_FOUND, "fallback")) })
            }))
            .build()
            .unwrap();

        Fixture {
            dir,
            fallthrough,
            pipeline,
        }
    }

    fn get(path: &str) -> Request {
        Request::builder().uri(path).build().unwrap()
    }

    #[tokio::test]
    async fn test_serves_file_with_headers() {
        let fx = fixture();
        let response = fx.pipeline.process(get("/app.css")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/css; charset=utf-8"
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=600"
        );
        assert!(response.headers().contains_key(ETAG));
        assert!(response.headers().contains_key(LAST_MODIFIED));
        assert_eq!(response.body_bytes(), Bytes::from("body { color: red; }"));
        assert_eq!(
            response.extensions().get::<MatchedRoute>().map(MatchedRoute::as_str),
            Some(STATIC_ROUTE)
        );
        assert_eq!(fx.fallthrough.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_binary_file_has_no_charset() {
        let fx = fixture();
        let response = fx.pipeline.process(get("/img/logo.png")).await.unwrap();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    }

    #[tokio::test]
    async fn test_if_none_match_returns_304() {
        let fx = fixture();
        let first = fx.pipeline.process(get("/app.css")).await.unwrap();
        let etag = first.headers().get(ETAG).unwrap().to_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/app.css")
            .header("If-None-Match", etag.clone())
            .build()
            .unwrap();
        let response = fx.pipeline.process(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.body_bytes().is_empty());
        assert_eq!(response.headers().get(ETAG).unwrap(), etag.as_str());
        assert_eq!(fx.fallthrough.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_if_none_match_wildcard() {
        let fx = fixture();
        let request = Request::builder()
            .uri("/app.css")
            .header("If-None-Match", "*")
            .build()
            .unwrap();
        let response = fx.pipeline.process(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_head_has_empty_body() {
        let fx = fixture();
        let request = Request::builder()
            .method(Method::HEAD)
            .uri("/app.css")
            .build()
            .unwrap();
        let response = fx.pipeline.process(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body_bytes().is_empty());
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "20");
    }

    #[tokio::test]
    async fn test_delegates_when_not_served() {
        let fx = fixture();
        for path in ["/missing.css", "/../secret", "/.env", "/img", "/"] {
            let response = fx.pipeline.process(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        }

        let post = Request::builder()
            .method(Method::POST)
            .uri("/app.css")
            .build()
            .unwrap();
        fx.pipeline.process(post).await.unwrap();
        assert_eq!(fx.fallthrough.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_hidden_files_when_enabled() {
        let fx = fixture();
        let pipeline = Pipeline::builder()
            .stage(StaticAssetsMiddleware::new(fx.dir.path()).with_serve_hidden(true))
            .build()
            .unwrap();
        let response = pipeline.process(get("/.env")).await.unwrap();
        assert_eq!(response.body_bytes(), Bytes::from("SECRET=1"));
    }

    #[test]
    fn test_from_config_resolves_relative_root() {
        let config = StaticAssetsConfig {
            enabled: true,
            root: PathBuf::from("public"),
            max_age_secs: 60,
            serve_hidden: false,
        };
        let middleware = StaticAssetsMiddleware::from_config(&config, Path::new("/srv/app"));
        assert_eq!(middleware.root(), Path::new("/srv/app/public"));

        let unanchored = StaticAssetsMiddleware::from_config(&config, Path::new(""));
        assert_eq!(unanchored.root(), Path::new("public"));
    }
}
