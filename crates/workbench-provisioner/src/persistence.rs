use std::path::{Path, PathBuf};

use aws_sdk_s3::Client as S3Client;
use workbench_storage::error::StorageError;

use crate::error::ProvisionerError;
use crate::runner::WorkflowState;

/// S3 prefix of persisted workflow state.
pub const WORKFLOW_PREFIX: &str = "_workflows";

/// Dual-write workflow persistence: local disk (safety net) + S3
/// (shared across workers). Without a bucket only the local copy is kept.
pub struct WorkflowPersistence {
    pub s3: Option<S3Client>,
    pub bucket: String,
    pub local_dir: PathBuf,
}

impl WorkflowPersistence {
    pub fn new(s3: Option<S3Client>, bucket: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            s3,
            bucket: bucket.into(),
            local_dir: local_dir.into(),
        }
    }

    /// Local-only persistence.
    pub fn local(local_dir: impl Into<PathBuf>) -> Self {
        Self::new(None, String::new(), local_dir)
    }

    pub fn s3_key(workflow_id: &str) -> String {
        format!("{WORKFLOW_PREFIX}/{workflow_id}.json")
    }

    pub fn local_path(&self, workflow_id: &str) -> PathBuf {
        self.local_dir.join(format!("{workflow_id}.json"))
    }

    /// Write state to local disk first (atomic: tmp + rename), then upload to S3.
    pub async fn flush(&self, state: &WorkflowState) -> Result<(), ProvisionerError> {
        let path = self.local_path(&state.workflow_id);
        write_atomic(&path, &serde_json::to_vec_pretty(state)?)?;
        tracing::debug!(path = %path.display(), "workflow state flushed to local disk");

        let Some(s3) = &self.s3 else {
            return Ok(());
        };
        let key = Self::s3_key(&state.workflow_id);
        match workbench_storage::state::save_state(s3, &self.bucket, &key, state).await {
            Ok(_) => {
                tracing::debug!(bucket = %self.bucket, key = %key, "workflow state flushed to S3");
            }
            Err(e) => {
                // The next load() picks up the local copy.
                tracing::warn!(
                    workflow_id = %state.workflow_id,
                    error = %e,
                    "failed to upload workflow state to S3 (local copy is safe)"
                );
            }
        }
        Ok(())
    }

    /// Load state from both copies and keep the most recently written one.
    ///
    /// A failed S3 upload leaves the local copy ahead of S3, so S3 only wins
    /// ties. `None` when neither exists.
    pub async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowState>, ProvisionerError> {
        let remote = self.load_s3(workflow_id).await;
        let local = self.load_local(workflow_id)?;
        Ok(newest(remote, local))
    }

    async fn load_s3(&self, workflow_id: &str) -> Option<WorkflowState> {
        let s3 = self.s3.as_ref()?;
        let key = Self::s3_key(workflow_id);
        match workbench_storage::state::load_state::<WorkflowState>(s3, &self.bucket, &key).await {
            Ok((state, _etag)) => {
                tracing::debug!(bucket = %self.bucket, key = %key, "workflow state loaded from S3");
                Some(state)
            }
            Err(StorageError::NotFound { .. }) => {
                tracing::debug!(workflow_id = %workflow_id, "no workflow state in S3");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load workflow state from S3, using local copy");
                None
            }
        }
    }

    fn load_local(&self, workflow_id: &str) -> Result<Option<WorkflowState>, ProvisionerError> {
        let path = self.local_path(workflow_id);
        if !path.exists() {
            return Ok(None);
        }
        let state = serde_json::from_slice(&std::fs::read(&path)?)?;
        tracing::debug!(path = %path.display(), "workflow state loaded from local disk");
        Ok(Some(state))
    }
}

fn newest(remote: Option<WorkflowState>, local: Option<WorkflowState>) -> Option<WorkflowState> {
    match (remote, local) {
        (Some(remote), Some(local)) if local.is_newer_than(&remote) => {
            tracing::info!(
                workflow_id = %local.workflow_id,
                local_revision = local.revision,
                s3_revision = remote.revision,
                "local workflow state is newer than S3"
            );
            Some(local)
        }
        (Some(remote), _) => Some(remote),
        (None, local) => local,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ProvisionerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
