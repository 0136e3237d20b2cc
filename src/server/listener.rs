//! Relay server listener
//!
//! Binds the TCP socket and serves the HTTP/WebSocket router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::device::DeviceConfigStore;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes::router;
use crate::server::state::AppState;

/// Camera relay server
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
}

impl RelayServer {
    /// Create a server, loading the device configuration document
    pub async fn new(config: ServerConfig) -> Self {
        let device_config = Arc::new(DeviceConfigStore::open(config.config_path.clone()).await);
        Self::with_device_config(config, device_config)
    }

    /// Create a server around an already opened configuration store
    pub fn with_device_config(config: ServerConfig, device_config: Arc<DeviceConfigStore>) -> Self {
        let state = AppState::new(&config, device_config);
        Self { config, state }
    }

    /// Shared state, for inspecting the registry and counters
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.max_upload_size)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            delivery = %self.config.delivery_mode,
            config = %self.state.device_config.path().display(),
            "Relay server listening"
        );

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

        Ok(())
    }
}
