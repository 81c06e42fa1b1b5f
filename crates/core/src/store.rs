use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{lifecycle::GenerationRequest, paths::get_state_path, types::VideoAvailability};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Client state written under the `shortreels_state` key. Maps are stored as
/// `[[id, value], ...]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub current_request_id: Option<String>,
    #[serde(default)]
    pub active_requests: Vec<(String, GenerationRequest)>,
    #[serde(default)]
    pub video_availability: Vec<(String, VideoAvailability)>,
    /// Unix milliseconds
    #[serde(default)]
    pub last_updated: i64,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.current_request_id.is_none()
            && self.active_requests.is_empty()
            && self.video_availability.is_empty()
    }

    pub fn request(&self, request_id: &str) -> Option<&GenerationRequest> {
        self.active_requests
            .iter()
            .find(|(id, _)| id == request_id)
            .map(|(_, r)| r)
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: get_state_path(state_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state resumes nothing.
    pub async fn load(&self) -> PersistedState {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PersistedState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read saved state");
                return PersistedState::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt saved state");
                PersistedState::default()
            }
        }
    }

    pub async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(state)?;
        self.write_atomic(&content).await?;
        debug!(
            path = %self.path.display(),
            requests = state.active_requests.len(),
            "state saved"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    async fn write_atomic(&self, content: &[u8]) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| self.io_error(std::io::Error::other("path has no parent")))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| self.io_error(e))?;

        let tmp_path = parent.join(format!(
            ".{}.tmp-{}",
            self.path
                .file_name()
                .and_then(|v| v.to_str())
                .unwrap_or("state"),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| self.io_error(e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(self.io_error(e));
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
