//! Problem documents for Meridian.
//!
//! Any failure that escapes the request pipeline becomes an RFC 7807-style
//! problem document, rendered in the format the caller negotiated.
//!
//! # Pieces
//!
//! - [`Sanitizer`] - turns a failure chain into a [`SafeThrowable`] with the
//!   project root obfuscated and, optionally, call arguments redacted
//! - [`ProblemFactory`] - resolves status, title and detail and attaches the
//!   sanitized chain in debug mode
//! - [`ProblemRenderer`] - JSON, HTML with template fallbacks, or markdown
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use meridian_config::AppSettings;
//! use meridian_core::{Failure, Request, ResponseExt};
//! use meridian_problem::{ProblemFactory, ProblemRenderer};
//! use http::Method;
//!
//! let factory = ProblemFactory::new(Arc::new(AppSettings::new("", "prod", false)));
//! let renderer = ProblemRenderer::new();
//!
//! let request = Request::builder().uri("/api/orders/9").build().unwrap();
//! let failure = Failure::route_not_found(&Method::GET, "/api/orders/9");
//!
//! let response = renderer.render(factory.create(&failure, &request));
//! assert_eq!(response.status(), 404);
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-problem/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod document;
pub mod factory;
pub mod renderer;
pub mod sanitizer;

pub use document::{ProblemDocument, ProblemExtensions, DEFAULT_PROBLEM_TYPE};
pub use factory::ProblemFactory;
pub use renderer::ProblemRenderer;
pub use sanitizer::{SafeFrame, SafeThrowable, Sanitizer, MAX_CHAIN_DEPTH, PROJECT_ROOT_PLACEHOLDER};
