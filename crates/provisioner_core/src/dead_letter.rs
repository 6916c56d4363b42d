//! Destination for messages that could not be provisioned.
//!
//! A message is dead-lettered exactly as it was received, so that it can be
//! inspected and re-submitted without any loss.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "dead_letter_tests.rs"]
mod tests;

/// Receives the raw bytes of messages that failed.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, raw: &[u8]) -> ProvisioningResult<()>;
}

/// Writes every dead-lettered message to its own file in a directory.
///
/// File names are `{timestamp}-{sequence}.json` so they sort in arrival order.
#[derive(Debug)]
pub struct FileDeadLetterSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl FileDeadLetterSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DeadLetterSink for FileDeadLetterSink {
    async fn send(&self, raw: &[u8]) -> ProvisioningResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ProvisioningError::DeadLetter(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{:06}.json", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), sequence);
        let path = self.dir.join(name);

        tokio::fs::write(&path, raw).await.map_err(|e| {
            ProvisioningError::DeadLetter(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), bytes = raw.len(), "Message dead-lettered");
        Ok(())
    }
}

/// Keeps dead-lettered messages in memory.
#[derive(Debug, Default)]
pub struct MemoryDeadLetterSink {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl MemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn send(&self, raw: &[u8]) -> ProvisioningResult<()> {
        self.messages
            .lock()
            .map_err(|e| ProvisioningError::DeadLetter(e.to_string()))?
            .push(raw.to_vec());
        Ok(())
    }
}
