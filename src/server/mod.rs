//! HTTP and WebSocket server

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use listener::RelayServer;
pub use routes::router;
pub use state::AppState;
