//! Connection sessions
//!
//! A session is one WebSocket from open to close: it waits for the
//! identification message, registers the connection as producer or
//! consumer, and releases the registry slot when the connection ends.

pub mod connection;
pub mod context;
pub mod state;

pub use connection::{run_session, Flow, Session};
pub use context::SessionContext;
pub use state::{SessionPhase, SessionState, Transition};
