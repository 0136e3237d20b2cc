//! Client registry for producer/consumer routing
//!
//! The registry tracks the one producer connection (the camera) and the set
//! of consumer connections (viewers). Fanout reads a snapshot of the consumer
//! set and pushes into each connection's outbound queue.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ClientRegistry>
//!                   ┌───────────────────────────┐
//!                   │ producer: Option<Handle>  │
//!                   │ consumers: HashMap<Id,    │
//!                   │   Handle { tx: mpsc }     │
//!                   │ >                         │
//!                   └─────────────┬─────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//!   [Producer]               [Consumer]               [Consumer]
//!   identify only            rx.recv()                rx.recv()
//!                                 │                        │
//!   POST /upload ──► Broadcaster::broadcast() ──► try_send ──► WebSocket
//! ```
//!
//! The encoded envelope is a `Utf8Bytes` backed by reference-counted
//! storage, so every consumer shares one allocation.

pub mod handle;
pub mod store;

pub use handle::{ClientHandle, ConnectionId, ConsumerId, DeliveryError, Outbound};
pub use store::{ClientRegistry, Unregistered};
