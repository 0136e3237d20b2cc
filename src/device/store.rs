//! File-backed device configuration store
//!
//! The document lives in memory behind a mutex and is written to disk on
//! every update. A write goes to a temporary file that is then renamed over
//! the target, so a failed update leaves both the file and the in-memory
//! copy at the last successfully written document.

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::document::{ConfigPatch, DeviceConfig};
use crate::error::{Error, Result};

/// Device configuration with last-write-wins persistence
#[derive(Debug)]
pub struct DeviceConfigStore {
    path: PathBuf,
    current: Mutex<DeviceConfig>,
}

impl DeviceConfigStore {
    /// Load the document at `path`
    ///
    /// A missing file is created with defaults. An unreadable or invalid
    /// file is left untouched and the defaults are used in memory.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let config = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<DeviceConfig>(&text) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), ?config, "Configuration loaded");
                    config
                }
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Invalid configuration file, using defaults"
                    );
                    DeviceConfig::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = DeviceConfig::default();
                match write_document(&path, &config).await {
                    Ok(()) => tracing::info!(
                        path = %path.display(),
                        "Default configuration created"
                    ),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not create default configuration file"
                    ),
                }
                config
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read configuration, using defaults"
                );
                DeviceConfig::default()
            }
        };

        Self {
            path,
            current: Mutex::new(config),
        }
    }

    /// In-memory store that starts from `config`
    pub fn with_config(path: impl Into<PathBuf>, config: DeviceConfig) -> Self {
        Self {
            path: path.into(),
            current: Mutex::new(config),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document
    pub async fn get(&self) -> DeviceConfig {
        self.current.lock().await.clone()
    }

    /// Merge `patch` into the document and persist it
    ///
    /// Returns the new document. On failure the previous document stays
    /// current.
    pub async fn update(&self, patch: &ConfigPatch) -> Result<DeviceConfig> {
        patch.validate()?;

        let mut current = self.current.lock().await;
        let updated = current.merged(patch);

        write_document(&self.path, &updated)
            .await
            .map_err(|source| Error::ConfigPersist {
                path: self.path.clone(),
                source,
            })?;

        *current = updated.clone();
        tracing::info!(config = ?updated, "Configuration updated");

        Ok(updated)
    }
}

async fn write_document(path: &Path, config: &DeviceConfig) -> io::Result<()> {
    let text = serde_json::to_string_pretty(config).map_err(io::Error::other)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, text).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
