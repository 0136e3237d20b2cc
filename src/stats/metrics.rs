//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Server-wide counters, updated lock-free from any task
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    total_connections: AtomicU64,
    images_ingested: AtomicU64,
    bytes_ingested: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    producer_replacements: AtomicU64,
    protocol_violations: AtomicU64,
}

impl RelayStats {
    /// Create a zeroed stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            images_ingested: AtomicU64::new(0),
            bytes_ingested: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            producer_replacements: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
        }
    }

    /// Record an accepted WebSocket connection
    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted image of `size` bytes
    pub fn record_ingest(&self, size: usize) {
        self.images_ingested.fetch_add(1, Ordering::Relaxed);
        self.bytes_ingested.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Record the outcome of one fanout
    pub fn record_fanout(&self, delivered: usize, failed: usize) {
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Record a producer being superseded
    pub fn record_replacement(&self) {
        self.producer_replacements.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed for a malformed message
    pub fn record_protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the tracker was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            images_ingested: self.images_ingested.load(Ordering::Relaxed),
            bytes_ingested: self.bytes_ingested.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            producer_replacements: self.producer_replacements.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// WebSocket connections accepted
    pub total_connections: u64,
    /// Images accepted for fanout
    pub images_ingested: u64,
    /// Total image bytes accepted
    pub bytes_ingested: u64,
    /// Successful per-consumer enqueues
    pub deliveries: u64,
    /// Failed per-consumer enqueues
    pub delivery_failures: u64,
    /// Producers closed because a newer one identified
    pub producer_replacements: u64,
    /// Connections closed for malformed identification
    pub protocol_violations: u64,
}
