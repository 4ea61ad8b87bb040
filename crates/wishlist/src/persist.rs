//! Durable storage for the sync state
//!
//! The pipeline only needs "load what was saved last time" and "save this".
//! [`JsonFilePersistence`] writes pretty JSON next to a temp file and renames
//! it into place, so a crash mid-write never leaves a truncated state file.

use crate::error::{FileOperation, Result, SyncError};
use crate::model::SyncState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Capability to store and retrieve [`SyncState`] across restarts
#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Load saved state; `None` when nothing was saved yet
    async fn load(&self) -> Result<Option<SyncState>>;

    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// Stores state as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

fn io_error(path: &Path, operation: FileOperation) -> impl FnOnce(std::io::Error) -> SyncError + '_ {
    move |source| SyncError::Persistence {
        path: path.to_path_buf(),
        operation,
        source,
    }
}

#[async_trait]
impl StatePersistence for JsonFilePersistence {
    async fn load(&self) -> Result<Option<SyncState>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved wish list state at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(io_error(&self.path, FileOperation::Read)(e)),
        };

        let state: SyncState = serde_json::from_slice(&data)?;
        debug!(
            "Loaded wish list state from {} ({} rolls)",
            self.path.display(),
            state.current.len()
        );
        Ok(Some(state))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(io_error(parent, FileOperation::CreateDir))?;
            }
        }

        let mut payload = serde_json::to_vec_pretty(state)?;
        payload.push(b'\n');

        let temp_path = self.temp_path();
        fs::write(&temp_path, payload)
            .await
            .map_err(io_error(&temp_path, FileOperation::Write))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(io_error(&self.path, FileOperation::Move))?;

        debug!("Saved wish list state to {}", self.path.display());
        Ok(())
    }
}
