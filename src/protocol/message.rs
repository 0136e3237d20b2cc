//! Wire messages exchanged over the relay WebSocket
//!
//! All messages are JSON text frames with a `"type"` discriminant.
//!
//! Client → server: `{"type": "producer"}` or `{"type": "consumer"}`.
//! Server → client: `{"type": "image", ...}` and `{"type": "error", ...}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Role a connection claims during identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The camera device
    #[serde(alias = "esp32")]
    Producer,
    /// A viewer application
    #[serde(alias = "android")]
    Consumer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Consumer => write!(f, "consumer"),
        }
    }
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Identification with a recognised role
    Identify(Role),
    /// Well-formed JSON whose `type` is absent or not a known role
    Unknown {
        /// Raw `type` value, if any
        kind: Option<String>,
    },
}

impl ClientMessage {
    /// Decode a text frame
    ///
    /// Only malformed JSON is an error. Any parseable value without a
    /// recognised `type` (including non-objects) decodes to `Unknown`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Decode a binary frame by interpreting it as UTF-8 JSON
    pub fn decode_binary(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::decode(text)
    }

    fn from_value(mut value: Value) -> Self {
        let kind = value.get_mut("type").map(Value::take);

        match kind {
            Some(kind) => match serde_json::from_value::<Role>(kind.clone()) {
                Ok(role) => ClientMessage::Identify(role),
                Err(_) => ClientMessage::Unknown {
                    kind: Some(match kind {
                        Value::String(s) => s,
                        other => other.to_string(),
                    }),
                },
            },
            None => ClientMessage::Unknown { kind: None },
        }
    }
}

/// Body of an `image` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageBody {
    /// Base64-encoded image bytes
    Inline {
        /// Standard base64 with padding
        data: String,
    },
    /// Retrieval path for the image
    Reference {
        /// HTTP path serving the latest frame
        path: String,
    },
}

/// A message sent from the server to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Image fanout
    Image(ImageBody),
    /// Notification of a rejected message
    Error {
        /// Human-readable description
        message: String,
    },
}

impl ServerMessage {
    /// Image envelope carrying the payload inline
    pub fn inline_image(payload: &[u8]) -> Self {
        ServerMessage::Image(ImageBody::Inline {
            data: STANDARD.encode(payload),
        })
    }

    /// Image envelope pointing at a retrieval path
    pub fn image_reference(path: impl Into<String>) -> Self {
        ServerMessage::Image(ImageBody::Reference { path: path.into() })
    }

    /// Error envelope
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serialize to the JSON text sent on the wire
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
