//! Shared context handed to every connection

use std::sync::Arc;
use std::time::Duration;

use crate::registry::ClientRegistry;
use crate::stats::RelayStats;

/// Dependencies and limits shared by all connection tasks
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Producer/consumer registry
    pub registry: Arc<ClientRegistry>,

    /// Server-wide counters
    pub stats: Arc<RelayStats>,

    /// Capacity of each connection's outbound queue
    pub outbound_capacity: usize,

    /// Upper bound on a single socket write
    pub send_timeout: Duration,
}

impl SessionContext {
    /// Create a context with default limits
    pub fn new(registry: Arc<ClientRegistry>, stats: Arc<RelayStats>) -> Self {
        Self {
            registry,
            stats,
            outbound_capacity: 16,
            send_timeout: Duration::from_secs(5),
        }
    }

    /// Set the outbound queue capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the socket write timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
