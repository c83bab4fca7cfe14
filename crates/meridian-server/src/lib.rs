//! # Meridian Server
//!
//! HTTP/1.1 transport for the Meridian request pipeline.
//!
//! The server owns everything connection-level:
//!
//! - binding and accepting on a TCP listener
//! - turning hyper requests into [`meridian_core::Request`] values with
//!   server parameters (`REMOTE_ADDR`, `REMOTE_PORT`, `SERVER_PROTOCOL`,
//!   `REQUEST_TIME`, `SERVER_NAME`)
//! - enforcing the body size limit while collecting
//! - the optional Prometheus endpoint
//! - graceful shutdown with a drain timeout
//!
//! Everything else is the [`Kernel`](meridian_middleware::Kernel)'s job.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_config::MeridianConfig;
//! use meridian_core::RouteTable;
//! use meridian_middleware::Kernel;
//! use meridian_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MeridianConfig::development();
//!     let kernel = Kernel::builder(config.clone())
//!         .router(RouteTable::new())
//!         .build()?;
//!
//!     Server::from_config(kernel, &config).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/meridian-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use error::ServerError;
pub use server::{Server, ServerBuilder};
pub use shutdown::{ConnectionGuard, ConnectionTracker, ShutdownSignal};
pub use transport::PeerInfo;
