//! Single-slot store for the most recent image

use bytes::Bytes;
use tokio::sync::RwLock;

/// Holds the last ingested image; each store overwrites the previous one
#[derive(Debug, Default)]
pub struct LatestFrame {
    frame: RwLock<Option<Bytes>>,
}

impl LatestFrame {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored image
    pub async fn store(&self, image: Bytes) {
        *self.frame.write().await = Some(image);
    }

    /// The stored image, if any
    pub async fn load(&self) -> Option<Bytes> {
        self.frame.read().await.clone()
    }
}
