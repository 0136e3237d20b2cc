//! Identification state machine
//!
//! Tracks one connection from open to close and decides what each inbound
//! message means for it. The state machine is pure: it returns a
//! [`Transition`] and the connection applies it to the registry.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::ProtocolError;
use crate::protocol::{ClientMessage, Role};
use crate::registry::{ConnectionId, ConsumerId};

/// Message sent back for an unrecognised `type`
pub const UNKNOWN_CLIENT_TYPE: &str = "unknown client type";

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Open, waiting for a valid identification
    Unidentified,
    /// Identified as the producer
    Producer,
    /// Identified as a consumer with this registry id
    Consumer(ConsumerId),
    /// Finished; no further messages are processed
    Closed,
}

impl SessionPhase {
    /// Role held in this phase, if identified
    pub fn role(&self) -> Option<Role> {
        match self {
            SessionPhase::Producer => Some(Role::Producer),
            SessionPhase::Consumer(_) => Some(Role::Consumer),
            SessionPhase::Unidentified | SessionPhase::Closed => None,
        }
    }
}

/// What the connection should do with an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Register the connection in this role
    Register(Role),
    /// Keep the connection open and send an error notification
    Reject(String),
    /// Close the connection for a malformed message
    Violation,
    /// Nothing to do
    Ignore,
}

/// Per-connection state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: Option<SocketAddr>,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time the connection identified
    pub identified_at: Option<Instant>,

    /// Rejected identification attempts
    pub rejected_attempts: u32,
}

impl SessionState {
    /// Create the state for a newly opened connection
    pub fn new(id: ConnectionId, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Unidentified,
            connected_at: Instant::now(),
            identified_at: None,
            rejected_attempts: 0,
        }
    }

    /// Decide what a decoded inbound message means in the current phase
    ///
    /// Before identification a malformed message is fatal and an unknown
    /// type is rejected. After identification the role is fixed: repeating
    /// it is ignored, claiming the other role is rejected, anything else is
    /// ignored.
    pub fn next(&self, message: &Result<ClientMessage, ProtocolError>) -> Transition {
        match (self.phase, message) {
            (SessionPhase::Closed, _) => Transition::Ignore,

            (SessionPhase::Unidentified, Err(_)) => Transition::Violation,
            (SessionPhase::Unidentified, Ok(ClientMessage::Identify(role))) => {
                Transition::Register(*role)
            }
            (SessionPhase::Unidentified, Ok(ClientMessage::Unknown { .. })) => {
                Transition::Reject(UNKNOWN_CLIENT_TYPE.into())
            }

            (phase, Ok(ClientMessage::Identify(role))) if phase.role() != Some(*role) => {
                Transition::Reject(format!(
                    "connection already identified as {}",
                    phase.role().map(|r| r.to_string()).unwrap_or_default()
                ))
            }
            _ => Transition::Ignore,
        }
    }

    /// Record identification as the producer
    pub fn become_producer(&mut self) {
        if self.phase == SessionPhase::Unidentified {
            self.phase = SessionPhase::Producer;
            self.identified_at = Some(Instant::now());
        }
    }

    /// Record identification as a consumer
    pub fn become_consumer(&mut self, id: ConsumerId) {
        if self.phase == SessionPhase::Unidentified {
            self.phase = SessionPhase::Consumer(id);
            self.identified_at = Some(Instant::now());
        }
    }

    /// Record a rejected identification attempt
    pub fn reject(&mut self) {
        self.rejected_attempts += 1;
    }

    /// Move to the closed phase, returning the phase it left
    pub fn close(&mut self) -> SessionPhase {
        std::mem::replace(&mut self.phase, SessionPhase::Closed)
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
