//! Close codes used when the relay terminates a connection

/// A WebSocket close code and reason pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseReason {
    /// RFC 6455 status code
    pub code: u16,
    /// Reason text sent in the close frame
    pub reason: &'static str,
}

impl CloseReason {
    /// A newer producer identified; the previous one is dropped
    pub const SUPERSEDED: CloseReason = CloseReason {
        code: 1000,
        reason: "superseded by new producer",
    };

    /// The identification message could not be parsed
    pub const PROTOCOL_VIOLATION: CloseReason = CloseReason {
        code: 1002,
        reason: "invalid message",
    };
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.reason)
    }
}
