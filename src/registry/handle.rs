//! Connection handles stored in the registry
//!
//! A [`ClientHandle`] is the registry's view of one live WebSocket: an id and
//! the sending half of that connection's outbound queue. The connection task
//! owns the receiving half and writes whatever arrives to the socket.

use std::net::SocketAddr;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use crate::protocol::CloseReason;

/// Identifier of one accepted connection, unique for the server's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifier allocated to a consumer when it registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Item queued for delivery on a connection
#[derive(Debug, Clone)]
pub enum Outbound {
    /// JSON text frame
    Text(Utf8Bytes),
    /// Close the connection; nothing is written after this
    Close(CloseReason),
}

/// Reason a non-blocking enqueue failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's queue is full (slow reader)
    #[error("outbound queue full")]
    Full,
    /// The connection task has gone away
    #[error("connection closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for DeliveryError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        }
    }
}

/// Handle to one connection's outbound queue
///
/// Cheap to clone. Two handles are equal when they refer to the same
/// connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    tx: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    /// Create a handle with a bounded queue of `capacity` items
    ///
    /// Returns the handle and the receiver the connection task drains.
    pub fn new(
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, peer_addr, tx }, rx)
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, when known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Enqueue a text frame without waiting
    pub fn try_send_text(&self, text: Utf8Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(Outbound::Text(text))?;
        Ok(())
    }

    /// Ask the connection to close with `reason`
    ///
    /// The close is queued behind frames already pending. If the queue is
    /// full it is handed to a background task so the caller never waits.
    pub fn close(&self, reason: CloseReason) {
        match self.tx.try_send(Outbound::Close(reason)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(item).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn = %self.id, "Close requested on finished connection");
            }
        }
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}
