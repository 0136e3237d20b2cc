//! Image ingestion
//!
//! Uploaded images enter the relay here. The payload is validated, counted
//! and handed to the [`Broadcaster`](crate::fanout::Broadcaster) in the
//! deployment's delivery mode.

pub mod latest;

use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::IngestError;
use crate::fanout::Broadcaster;
use crate::protocol::ServerMessage;
use crate::stats::RelayStats;

pub use latest::LatestFrame;

/// Path under which the latest frame is served in reference mode
pub const LATEST_PATH: &str = "/latest";

/// How consumers receive an ingested image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Base64 image bytes inside the `image` envelope
    #[default]
    Inline,
    /// The `image` envelope carries a path; bytes are fetched over HTTP
    Reference,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(DeliveryMode::Inline),
            "reference" | "ref" => Ok(DeliveryMode::Reference),
            other => Err(format!(
                "unknown delivery mode '{}', expected 'inline' or 'reference'",
                other
            )),
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Inline => write!(f, "inline"),
            DeliveryMode::Reference => write!(f, "reference"),
        }
    }
}

/// Result of a successful ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Image size in bytes
    pub size: usize,
    /// Consumers the image was delivered to
    pub delivered: usize,
}

/// Validates uploaded images and fans them out
#[derive(Debug, Clone)]
pub struct Ingestor {
    broadcaster: Broadcaster,
    mode: DeliveryMode,
    latest: Arc<LatestFrame>,
    stats: Arc<RelayStats>,
}

impl Ingestor {
    /// Create an ingestor
    pub fn new(
        broadcaster: Broadcaster,
        mode: DeliveryMode,
        latest: Arc<LatestFrame>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            broadcaster,
            mode,
            latest,
            stats,
        }
    }

    /// Delivery mode in use
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Accept one image and broadcast it
    ///
    /// An empty payload is rejected before anything is broadcast.
    pub async fn ingest(&self, payload: Bytes) -> Result<IngestReport, IngestError> {
        if payload.is_empty() {
            tracing::warn!("Rejected empty image upload");
            return Err(IngestError::EmptyPayload);
        }

        let size = payload.len();
        tracing::info!(bytes = size, mode = %self.mode, "Image received");
        self.stats.record_ingest(size);

        let message = match self.mode {
            DeliveryMode::Inline => ServerMessage::inline_image(&payload),
            DeliveryMode::Reference => {
                self.latest.store(payload).await;
                ServerMessage::image_reference(LATEST_PATH)
            }
        };

        let report = self.broadcaster.broadcast_message(&message).await?;

        Ok(IngestReport {
            size,
            delivered: report.delivered,
        })
    }
}
