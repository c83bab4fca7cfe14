//! # Meridian Test
//!
//! In-memory testing for Meridian applications. A [`TestClient`] hands
//! requests directly to a [`Kernel`](meridian_middleware::Kernel), so tests
//! exercise every pipeline stage and the failure boundary without binding a
//! port.
//!
//! ## Example
//!
//! ```ignore
//! use meridian_test::TestClient;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_missing_route() {
//!     let client = TestClient::new(kernel);
//!
//!     client
//!         .get("/api/mustFail")
//!         .send()
//!         .await
//!         .assert_status(StatusCode::NOT_FOUND)
//!         .assert_json_field("title", &json!("Not Found"))
//!         .assert_json_field("extensions.debug", &json!(true));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequestBuilder, TEST_REMOTE_ADDR};
pub use response::TestResponse;
