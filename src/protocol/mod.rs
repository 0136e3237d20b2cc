//! Relay wire protocol
//!
//! JSON envelopes exchanged with producers and consumers, and the close
//! reasons the relay uses when it ends a connection.

pub mod close;
pub mod message;

pub use close::CloseReason;
pub use message::{ClientMessage, ImageBody, Role, ServerMessage};
