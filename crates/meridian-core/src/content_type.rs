//! Closed set of representation formats.
//!
//! [`ContentType`] is the vocabulary shared by the negotiator, the response
//! normalizer, the problem renderer and the static asset stage. Each variant
//! is a `(main type, subtype)` pair and knows whether it is text-like, which
//! decides whether a `charset=utf-8` parameter is appended to the header
//! value.
//!
//! # Example
//!
//! ```
//! use meridian_core::ContentType;
//!
//! let ct = ContentType::from_extension("JSON");
//! assert_eq!(ct, ContentType::Json);
//! assert_eq!(ct.sub_type(), "json");
//!
//! assert_eq!(ContentType::from_extension("exe"), ContentType::OctetStream);
//! assert_eq!(ContentType::Html.header_value(), "text/html; charset=utf-8");
//! ```

use std::fmt;
use std::path::Path;

/// A representation format known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `text/html`
    Html,
    /// `text/plain`
    Plain,
    /// `text/markdown`
    Markdown,
    /// `text/csv`
    Csv,
    /// `application/xml`
    Xml,
    /// `text/css`
    Css,
    /// `text/javascript`
    Javascript,
    /// `image/png`
    Png,
    /// `image/jpeg`
    Jpeg,
    /// `image/gif`
    Gif,
    /// `image/svg+xml`
    Svg,
    /// `image/webp`
    Webp,
    /// `image/x-icon`
    Ico,
    /// `application/pdf`
    Pdf,
    /// `application/zip`
    Zip,
    /// `application/wasm`
    Wasm,
    /// `font/woff`
    Woff,
    /// `font/woff2`
    Woff2,
    /// `application/octet-stream`, the fallback for anything unrecognised.
    #[default]
    OctetStream,
}

impl ContentType {
    /// Every variant, in declaration order.
    pub const ALL: [ContentType; 20] = [
        Self::Json,
        Self::Html,
        Self::Plain,
        Self::Markdown,
        Self::Csv,
        Self::Xml,
        Self::Css,
        Self::Javascript,
        Self::Png,
        Self::Jpeg,
        Self::Gif,
        Self::Svg,
        Self::Webp,
        Self::Ico,
        Self::Pdf,
        Self::Zip,
        Self::Wasm,
        Self::Woff,
        Self::Woff2,
        Self::OctetStream,
    ];

    /// Returns the MIME main type (`"text"`, `"application"`, ...).
    #[must_use]
    pub const fn main_type(self) -> &'static str {
        match self {
            Self::Html | Self::Plain | Self::Markdown | Self::Csv | Self::Css | Self::Javascript => {
                "text"
            }
            Self::Png | Self::Jpeg | Self::Gif | Self::Svg | Self::Webp | Self::Ico => "image",
            Self::Woff | Self::Woff2 => "font",
            Self::Json | Self::Xml | Self::Pdf | Self::Zip | Self::Wasm | Self::OctetStream => {
                "application"
            }
        }
    }

    /// Returns the MIME subtype (`"json"`, `"html"`, ...).
    ///
    /// This is also the name the pipeline uses for the "preferred format".
    #[must_use]
    pub const fn sub_type(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Plain => "plain",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
            Self::Xml => "xml",
            Self::Css => "css",
            Self::Javascript => "javascript",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Svg => "svg+xml",
            Self::Webp => "webp",
            Self::Ico => "x-icon",
            Self::Pdf => "pdf",
            Self::Zip => "zip",
            Self::Wasm => "wasm",
            Self::Woff => "woff",
            Self::Woff2 => "woff2",
            Self::OctetStream => "octet-stream",
        }
    }

    /// Returns the bare MIME type, e.g. `text/html`.
    #[must_use]
    pub fn mime(self) -> String {
        format!("{}/{}", self.main_type(), self.sub_type())
    }

    /// Returns `true` for formats whose bodies are text and carry a charset.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::Html
                | Self::Plain
                | Self::Markdown
                | Self::Csv
                | Self::Css
                | Self::Javascript
                | Self::Xml
                | Self::Svg
        )
    }

    /// Returns `true` for the default/unknown type.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::OctetStream)
    }

    /// Returns the value to put in a `Content-Type` header.
    ///
    /// Text-like formats get a `; charset=utf-8` suffix.
    #[must_use]
    pub fn header_value(self) -> String {
        if self.is_text() {
            format!("{}; charset=utf-8", self.mime())
        } else {
            self.mime()
        }
    }

    /// Maps a file extension (without the dot, any case) to a content type.
    ///
    /// Unknown extensions map to [`ContentType::OctetStream`].
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "json" | "map" => Self::Json,
            "html" | "htm" => Self::Html,
            "txt" | "text" => Self::Plain,
            "md" | "markdown" => Self::Markdown,
            "csv" => Self::Csv,
            "xml" => Self::Xml,
            "css" => Self::Css,
            "js" | "mjs" => Self::Javascript,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "svg" => Self::Svg,
            "webp" => Self::Webp,
            "ico" => Self::Ico,
            "pdf" => Self::Pdf,
            "zip" => Self::Zip,
            "wasm" => Self::Wasm,
            "woff" => Self::Woff,
            "woff2" => Self::Woff2,
            _ => Self::OctetStream,
        }
    }

    /// Infers the content type from the extension of a path.
    ///
    /// Paths without an extension map to [`ContentType::OctetStream`].
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map_or(Self::OctetStream, Self::from_extension)
    }

    /// Looks up a content type from a MIME essence such as `application/json`.
    ///
    /// Parameters (`; charset=...`) are ignored. Returns `None` for MIME types
    /// outside the closed set.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|ct| ct.mime().eq_ignore_ascii_case(essence))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type(), self.sub_type())
    }
}
