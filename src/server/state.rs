//! Shared application state for route handlers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::DeviceConfigStore;
use crate::fanout::Broadcaster;
use crate::ingest::{Ingestor, LatestFrame};
use crate::registry::{ClientRegistry, ConnectionId};
use crate::server::config::ServerConfig;
use crate::session::SessionContext;
use crate::stats::RelayStats;

/// State handed to every handler; cheap to clone
#[derive(Debug, Clone)]
pub struct AppState {
    /// Context for WebSocket sessions
    pub session_ctx: SessionContext,
    /// Upload path into the fanout
    pub ingestor: Ingestor,
    /// Device configuration document
    pub device_config: Arc<DeviceConfigStore>,
    /// Last image, served in reference mode
    pub latest: Arc<LatestFrame>,
    next_connection_id: Arc<AtomicU64>,
}

impl AppState {
    /// Build the state with a fresh registry
    pub fn new(config: &ServerConfig, device_config: Arc<DeviceConfigStore>) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let stats = Arc::new(RelayStats::new());
        let latest = Arc::new(LatestFrame::new());

        let session_ctx = SessionContext::new(Arc::clone(&registry), Arc::clone(&stats))
            .outbound_capacity(config.outbound_capacity)
            .send_timeout(config.send_timeout);

        let broadcaster = Broadcaster::new(registry, Arc::clone(&stats));
        let ingestor = Ingestor::new(
            broadcaster,
            config.delivery_mode,
            Arc::clone(&latest),
            stats,
        );

        Self {
            session_ctx,
            ingestor,
            device_config,
            latest,
            next_connection_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Producer/consumer registry
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.session_ctx.registry
    }

    /// Server-wide counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.session_ctx.stats
    }

    /// Allocate an id for a new connection
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }
}
