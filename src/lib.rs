//! WebSocket relay for a single camera and many viewers
//!
//! One producer (the camera) identifies itself over a WebSocket; any number
//! of consumers (viewer apps) do the same. Images uploaded over HTTP are
//! encoded once and pushed to every connected consumer. A small JSON
//! document holds the device settings shared between the camera and the
//! control app.
//!
//! # Example
//!
//! ```no_run
//! use camrelay::{RelayServer, ServerConfig};
//!
//! # async fn run() -> camrelay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default()).await;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use ingest::DeliveryMode;
pub use server::{RelayServer, ServerConfig};
