//! Client registry implementation
//!
//! Holds the single producer slot and the consumer set. All mutations and
//! the fanout snapshot go through one `RwLock`, so registration, removal and
//! iteration are serialized against each other.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::handle::{ClientHandle, ConnectionId, ConsumerId};
use crate::protocol::CloseReason;

/// Which slot a connection occupied when it was unregistered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unregistered {
    /// It was the current producer
    Producer,
    /// It was a consumer with this id
    Consumer(ConsumerId),
    /// It was not registered (or was already superseded)
    NotRegistered,
}

#[derive(Debug, Default)]
struct Slots {
    producer: Option<ClientHandle>,
    consumers: HashMap<ConsumerId, ClientHandle>,
    next_consumer_id: u64,
}

/// Registry of the current producer and all consumers
///
/// Constructed once per server and shared behind an `Arc`. Independent
/// instances do not interact.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    slots: RwLock<Slots>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` as the producer
    ///
    /// Any previous producer is closed with [`CloseReason::SUPERSEDED`] and
    /// returned. Re-registering the current producer is a no-op.
    pub async fn register_producer(&self, handle: ClientHandle) -> Option<ClientHandle> {
        let mut slots = self.slots.write().await;

        if slots.producer.as_ref() == Some(&handle) {
            return None;
        }

        let previous = slots.producer.replace(handle.clone());

        if let Some(ref old) = previous {
            old.close(CloseReason::SUPERSEDED);
            tracing::info!(
                old = %old.id(),
                new = %handle.id(),
                "Producer superseded by new connection"
            );
        } else {
            tracing::info!(conn = %handle.id(), peer = ?handle.peer_addr(), "Producer connected");
        }

        previous
    }

    /// Add `handle` to the consumer set and return its id
    ///
    /// A connection already in the set keeps its existing id.
    pub async fn register_consumer(&self, handle: ClientHandle) -> ConsumerId {
        let mut slots = self.slots.write().await;

        if let Some((id, _)) = slots.consumers.iter().find(|(_, h)| **h == handle) {
            return *id;
        }

        slots.next_consumer_id += 1;
        let id = ConsumerId(slots.next_consumer_id);
        let conn = handle.id();
        slots.consumers.insert(id, handle);

        tracing::info!(
            conn = %conn,
            consumer = %id,
            total = slots.consumers.len(),
            "Consumer identified"
        );

        id
    }

    /// Remove `handle` from whichever slot holds it
    ///
    /// The producer slot is checked first, then the consumer set is scanned
    /// by handle equality. A handle in neither is a no-op.
    pub async fn unregister(&self, handle: &ClientHandle) -> Unregistered {
        let mut slots = self.slots.write().await;

        if slots.producer.as_ref() == Some(handle) {
            slots.producer = None;
            return Unregistered::Producer;
        }

        let found = slots
            .consumers
            .iter()
            .find(|(_, h)| *h == handle)
            .map(|(id, _)| *id);

        match found {
            Some(id) => {
                slots.consumers.remove(&id);
                Unregistered::Consumer(id)
            }
            None => Unregistered::NotRegistered,
        }
    }

    /// Remove the consumer registered under `id` by connection `conn`
    ///
    /// Returns `false` if no such entry exists.
    pub async fn remove_consumer(&self, id: ConsumerId, conn: ConnectionId) -> bool {
        let mut slots = self.slots.write().await;

        match slots.consumers.get(&id) {
            Some(h) if h.id() == conn => {
                slots.consumers.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the consumer set for iteration outside the lock
    pub async fn consumers(&self) -> Vec<(ConsumerId, ClientHandle)> {
        let slots = self.slots.read().await;
        slots
            .consumers
            .iter()
            .map(|(id, h)| (*id, h.clone()))
            .collect()
    }

    /// Number of registered consumers
    pub async fn consumer_count(&self) -> usize {
        self.slots.read().await.consumers.len()
    }

    /// Whether a producer is registered
    pub async fn has_producer(&self) -> bool {
        self.slots.read().await.producer.is_some()
    }

    /// Connection id of the current producer
    pub async fn producer_id(&self) -> Option<ConnectionId> {
        self.slots.read().await.producer.as_ref().map(|h| h.id())
    }
}
