//! Durable progress records for provisioning runs.
//!
//! Remote calls are not transactional, so a run that fails half way leaves
//! some resources behind. Each completed step is recorded against the ticket's
//! work item id. When the same ticket is submitted again the orchestrator reads
//! the checkpoint and skips the steps that already happened. This matters most
//! for project creation, which must never allocate a second identifier for the
//! same ticket.
//!
//! A checkpoint also names the subject of the request it was written for. A
//! corrected ticket that asks for a different project or repository starts
//! from an empty checkpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::names::AzpId;
use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;

/// A completed provisioning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum CheckpointStep {
    #[serde(rename_all = "camelCase")]
    ProjectResolved {
        azp_id: AzpId,
        project_id: String,
        project_name: String,
    },
    GroupsCreated,
    #[serde(rename_all = "camelCase")]
    RepositoryResolved { repository_id: String },
    BranchesCreated,
    PermissionsApplied,
    PoliciesApplied,
}

/// Steps completed for one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub work_item_id: u64,
    /// Request the steps belong to, see [`CheckpointRecorder::load`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub completed_steps: Vec<CheckpointStep>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(work_item_id: u64) -> Self {
        Self {
            work_item_id,
            subject: None,
            completed_steps: Vec::new(),
            updated_at: None,
        }
    }

    pub fn for_subject(work_item_id: u64, subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::new(work_item_id)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.completed_steps.is_empty()
    }

    /// Returns true if `step` was recorded.
    pub fn contains(&self, step: &CheckpointStep) -> bool {
        self.completed_steps.contains(step)
    }

    /// Identifier, platform id and name of the project resolved by an earlier run.
    pub fn resolved_project(&self) -> Option<(AzpId, &str, &str)> {
        self.completed_steps.iter().find_map(|s| match s {
            CheckpointStep::ProjectResolved {
                azp_id,
                project_id,
                project_name,
            } => Some((*azp_id, project_id.as_str(), project_name.as_str())),
            _ => None,
        })
    }

    pub fn repository_id(&self) -> Option<&str> {
        self.completed_steps.iter().find_map(|s| match s {
            CheckpointStep::RepositoryResolved { repository_id } => Some(repository_id.as_str()),
            _ => None,
        })
    }
}

/// Persistence for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint of `work_item_id`, or an empty one if nothing was recorded.
    async fn load(&self, work_item_id: u64) -> ProvisioningResult<Checkpoint>;

    async fn save(&self, checkpoint: &Checkpoint) -> ProvisioningResult<()>;
}

/// Keeps checkpoints in memory. Progress is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<u64, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `checkpoint` directly, replacing any existing one.
    pub fn insert(&self, checkpoint: Checkpoint) {
        if let Ok(mut map) = self.checkpoints.lock() {
            map.insert(checkpoint.work_item_id, checkpoint);
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, work_item_id: u64) -> ProvisioningResult<Checkpoint> {
        let map = self
            .checkpoints
            .lock()
            .map_err(|e| ProvisioningError::Checkpoint(e.to_string()))?;
        Ok(map
            .get(&work_item_id)
            .cloned()
            .unwrap_or_else(|| Checkpoint::new(work_item_id)))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> ProvisioningResult<()> {
        let mut map = self
            .checkpoints
            .lock()
            .map_err(|e| ProvisioningError::Checkpoint(e.to_string()))?;
        map.insert(checkpoint.work_item_id, checkpoint.clone());
        Ok(())
    }
}

/// Stores each checkpoint as `{dir}/{work_item_id}.json`.
///
/// Files are written to a temporary name first and then renamed, so a crash
/// never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, work_item_id: u64) -> PathBuf {
        self.dir.join(format!("{}.json", work_item_id))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, work_item_id: u64) -> ProvisioningResult<Checkpoint> {
        let path = self.path_for(work_item_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Checkpoint::new(work_item_id));
            }
            Err(e) => {
                return Err(ProvisioningError::Checkpoint(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes).map_err(|e| {
            ProvisioningError::Checkpoint(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if checkpoint.work_item_id != work_item_id {
            warn!(
                work_item_id = work_item_id,
                stored_id = checkpoint.work_item_id,
                "Checkpoint file belongs to another work item, ignoring it"
            );
            return Ok(Checkpoint::new(work_item_id));
        }

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> ProvisioningResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ProvisioningError::Checkpoint(format!(
                "Failed to create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.path_for(checkpoint.work_item_id);
        let temp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| ProvisioningError::Checkpoint(e.to_string()))?;

        tokio::fs::write(&temp, json).await.map_err(|e| {
            ProvisioningError::Checkpoint(format!("Failed to write {}: {}", temp.display(), e))
        })?;
        tokio::fs::rename(&temp, &path).await.map_err(|e| {
            ProvisioningError::Checkpoint(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!(
            work_item_id = checkpoint.work_item_id,
            steps = checkpoint.completed_steps.len(),
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Holds the checkpoint of the ticket being processed and persists every new step.
pub struct CheckpointRecorder {
    store: Arc<dyn CheckpointStore>,
    checkpoint: Checkpoint,
}

impl CheckpointRecorder {
    /// Loads the current checkpoint of `work_item_id` for the request identified by `subject`.
    ///
    /// Steps recorded for a different subject are discarded: the ticket was
    /// changed since the earlier run and none of its work applies.
    pub async fn load(
        store: Arc<dyn CheckpointStore>,
        work_item_id: u64,
        subject: &str,
    ) -> ProvisioningResult<Self> {
        let mut checkpoint = store.load(work_item_id).await?;
        if checkpoint.is_empty() {
            checkpoint.subject = Some(subject.to_string());
        } else if checkpoint.subject.as_deref() != Some(subject) {
            warn!(
                work_item_id = work_item_id,
                recorded = checkpoint.subject.as_deref().unwrap_or("<none>"),
                requested = subject,
                "Checkpoint was written for another request, starting over"
            );
            checkpoint = Checkpoint::for_subject(work_item_id, subject);
        } else {
            debug!(
                work_item_id = work_item_id,
                steps = checkpoint.completed_steps.len(),
                "Resuming from checkpoint"
            );
        }
        Ok(Self { store, checkpoint })
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn is_done(&self, step: &CheckpointStep) -> bool {
        self.checkpoint.contains(step)
    }

    /// Appends `step` and saves the checkpoint. Recording the same step twice is a no-op.
    pub async fn record(&mut self, step: CheckpointStep) -> ProvisioningResult<()> {
        if self.checkpoint.contains(&step) {
            return Ok(());
        }
        self.checkpoint.completed_steps.push(step);
        self.save().await
    }

    /// Forgets every recorded step and saves the empty checkpoint.
    pub async fn restart(&mut self) -> ProvisioningResult<()> {
        self.checkpoint.completed_steps.clear();
        self.save().await
    }

    async fn save(&mut self) -> ProvisioningResult<()> {
        self.checkpoint.updated_at = Some(Utc::now());
        self.store.save(&self.checkpoint).await
    }
}
