//! Trained artifact persistence

use crate::error::ArtifactError;
use crate::metrics::EvaluationReport;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fitted pipeline plus the facts needed to use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    /// Identity of this training run
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Rows in the training partition, before oversampling
    pub training_rows: usize,
    /// Fraud probability above which a row is flagged
    pub decision_threshold: f64,
    pub pipeline: Pipeline,
    /// Held-out evaluation, computed after fitting
    #[serde(default)]
    pub evaluation: Option<EvaluationReport>,
}

/// Single-slot storage for the current artifact.
///
/// `save` replaces the slot as a whole: readers see either the previous
/// artifact or the new one, never a partial write.
pub trait ArtifactStore: Send + Sync {
    /// Persist `artifact`, returning where it now lives
    fn save(&self, artifact: &TrainedArtifact) -> Result<String, ArtifactError>;

    /// Load the current artifact, `ArtifactError::NotFound` if none exists
    fn load(&self) -> Result<TrainedArtifact, ArtifactError>;

    fn location(&self) -> String;
}

/// JSON artifact at a well-known path, replaced via write-temp-then-rename
#[derive(Debug)]
pub struct FileArtifactStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, payload: &[u8]) -> Result<(), ArtifactError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // same directory as the slot so the rename never crosses filesystems
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(payload)?;
            file.sync_all()
        });
        let result = written.and_then(|_| fs::rename(&tmp, &self.path));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "Temporary artifact not removed");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, artifact: &TrainedArtifact) -> Result<String, ArtifactError> {
        let payload = serde_json::to_vec(artifact)?;

        let _guard = self.write_lock.lock().map_err(|_| ArtifactError::Poisoned)?;
        self.write_atomically(&payload)?;

        info!(
            model_id = %artifact.model_id,
            path = %self.path.display(),
            bytes = payload.len(),
            "Artifact persisted"
        );
        Ok(self.location())
    }

    fn load(&self) -> Result<TrainedArtifact, ArtifactError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Artifact not found");
                return Err(ArtifactError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let artifact: TrainedArtifact = serde_json::from_slice(&data)?;
        info!(
            model_id = %artifact.model_id,
            path = %self.path.display(),
            trained_at = %artifact.trained_at,
            "Artifact loaded"
        );
        Ok(artifact)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local slot
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    slot: RwLock<Option<TrainedArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(&self, artifact: &TrainedArtifact) -> Result<String, ArtifactError> {
        let mut slot = self.slot.write().map_err(|_| ArtifactError::Poisoned)?;
        *slot = Some(artifact.clone());
        Ok(self.location())
    }

    fn load(&self) -> Result<TrainedArtifact, ArtifactError> {
        self.slot
            .read()
            .map_err(|_| ArtifactError::Poisoned)?
            .clone()
            .ok_or_else(|| ArtifactError::NotFound(PathBuf::from(self.location())))
    }

    fn location(&self) -> String {
        "memory://fraud-model".to_string()
    }
}
