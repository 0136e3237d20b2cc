//! Image fanout to every registered consumer

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;

use crate::protocol::ServerMessage;
use crate::registry::{ClientRegistry, DeliveryError};
use crate::stats::RelayStats;

/// Outcome of one fanout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Consumers in the snapshot
    pub attempted: usize,
    /// Consumers whose queue accepted the message
    pub delivered: usize,
    /// Consumers whose enqueue failed
    pub failed: usize,
}

/// Delivers server messages to all consumers in the registry
///
/// Each consumer gets a non-blocking enqueue. A full or closed queue is
/// logged and counted; the consumer stays registered and the remaining
/// consumers are still attempted.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    stats: Arc<RelayStats>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`
    pub fn new(registry: Arc<ClientRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// Send `payload` as an inline `image` envelope
    ///
    /// Returns the number of consumers the image was delivered to.
    pub async fn broadcast(&self, payload: &[u8]) -> usize {
        match self
            .broadcast_message(&ServerMessage::inline_image(payload))
            .await
        {
            Ok(report) => report.delivered,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode image envelope");
                0
            }
        }
    }

    /// Encode `message` once and enqueue it on every consumer
    pub async fn broadcast_message(
        &self,
        message: &ServerMessage,
    ) -> Result<FanoutReport, serde_json::Error> {
        let consumers = self.registry.consumers().await;

        if consumers.is_empty() {
            tracing::info!("No consumer connected to receive the image");
            return Ok(FanoutReport::default());
        }

        let text = Utf8Bytes::from(message.to_text()?);
        let mut report = FanoutReport {
            attempted: consumers.len(),
            ..FanoutReport::default()
        };

        for (id, handle) in consumers {
            match handle.try_send_text(text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    match e {
                        DeliveryError::Full => tracing::warn!(
                            consumer = %id,
                            conn = %handle.id(),
                            "Consumer too slow, dropping image"
                        ),
                        DeliveryError::Closed => tracing::debug!(
                            consumer = %id,
                            conn = %handle.id(),
                            "Consumer already disconnected"
                        ),
                    }
                }
            }
        }

        self.stats.record_fanout(report.delivered, report.failed);

        tracing::debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            bytes = text.as_str().len(),
            "Image broadcast"
        );

        Ok(report)
    }
}
