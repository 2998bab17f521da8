//! File-backed checkpoint storage.
//!
//! Layout per project:
//!
//! ```text
//! <root>/<project_id>/
//!   checkpoint-000001.json
//!   checkpoint-000002.json
//!   latest                  # contains the id of the newest checkpoint
//! ```
//!
//! All writes go through a temp-file-then-rename path so a crash mid-write
//! can never leave a torn checkpoint behind the `latest` pointer.

use super::Checkpoint;
use crate::errors::CheckpointError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CHECKPOINT_PREFIX: &str = "checkpoint-";
const LATEST_FILE: &str = "latest";

pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    fn checkpoint_path(&self, project_id: &str, checkpoint_id: u64) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{}{:06}.json", CHECKPOINT_PREFIX, checkpoint_id))
    }

    fn latest_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(LATEST_FILE)
    }

    /// Whether any checkpoint exists for the project.
    pub fn project_exists(&self, project_id: &str) -> bool {
        self.latest_path(project_id).exists()
    }

    /// The next checkpoint id for a project: one past the highest stored id.
    pub fn next_id(&self, project_id: &str) -> Result<u64, CheckpointError> {
        Ok(self.checkpoint_ids(project_id)?.last().copied().unwrap_or(0) + 1)
    }

    /// All stored checkpoint ids for a project, ascending.
    pub fn checkpoint_ids(&self, project_id: &str) -> Result<Vec<u64>, CheckpointError> {
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| CheckpointError::Storage {
            path: dir.clone(),
            source,
        })?;

        let mut ids: Vec<u64> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| parse_checkpoint_id(&e.file_name().to_string_lossy()))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Write a checkpoint as a new immutable file and swap the `latest`
    /// pointer to it. Both writes are temp-then-rename.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let dir = self.project_dir(&checkpoint.project_id);
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Storage {
            path: dir.clone(),
            source,
        })?;

        let path = self.checkpoint_path(&checkpoint.project_id, checkpoint.checkpoint_id);
        let json = serde_json::to_string_pretty(checkpoint).map_err(|source| {
            CheckpointError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        atomic_write(&path, json.as_bytes())?;

        // The pointer swap only happens after the snapshot itself is durable.
        let latest = self.latest_path(&checkpoint.project_id);
        atomic_write(&latest, checkpoint.checkpoint_id.to_string().as_bytes())?;
        Ok(())
    }

    /// Read a specific checkpoint. Fails closed: a missing or unparsable
    /// file is an error, never an implicit empty state.
    pub fn read(&self, project_id: &str, checkpoint_id: u64) -> Result<Checkpoint, CheckpointError> {
        let path = self.checkpoint_path(project_id, checkpoint_id);
        if !path.exists() {
            return Err(CheckpointError::CheckpointNotFound {
                project_id: project_id.to_string(),
                checkpoint_id,
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| CheckpointError::Storage {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CheckpointError::Corrupt { path, source })
    }

    /// The id the `latest` pointer currently references, if the project exists.
    /// An unparsable pointer is an error, not a missing project.
    pub fn latest_id(&self, project_id: &str) -> Result<Option<u64>, CheckpointError> {
        let path = self.latest_path(project_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| CheckpointError::Storage {
            path: path.clone(),
            source,
        })?;
        let id = content
            .trim()
            .parse::<u64>()
            .map_err(|_| CheckpointError::CorruptLatestPointer { path })?;
        Ok(Some(id))
    }

    /// Read the checkpoint referenced by the `latest` pointer.
    pub fn read_latest(&self, project_id: &str) -> Result<Checkpoint, CheckpointError> {
        let id = self
            .latest_id(project_id)?
            .ok_or_else(|| CheckpointError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;
        self.read(project_id, id)
            .map_err(|err| match err {
                CheckpointError::CheckpointNotFound { .. } => {
                    CheckpointError::DanglingLatestPointer {
                        project_id: project_id.to_string(),
                        checkpoint_id: id,
                    }
                }
                other => other,
            })
    }

    /// Delete a single checkpoint file. Used only by explicit retention
    /// pruning; the `latest` pointer is never removed here.
    pub fn remove(&self, project_id: &str, checkpoint_id: u64) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(project_id, checkpoint_id);
        fs::remove_file(&path).map_err(|source| CheckpointError::Storage { path, source })
    }

    /// All project ids with stored checkpoints.
    pub fn project_ids(&self) -> Result<Vec<String>, CheckpointError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| CheckpointError::Storage {
            path: self.root.clone(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn parse_checkpoint_id(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(CHECKPOINT_PREFIX)?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Write to a sibling temp file, then rename over the target. Rename is
/// atomic on the same filesystem, so readers see either the old content or
/// the new content, never a partial write.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    let tmp = path.with_extension("tmp");
    let map_err = |source| CheckpointError::Storage {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(&tmp).map_err(map_err)?;
    file.write_all(bytes).map_err(map_err)?;
    file.sync_all().map_err(map_err)?;
    fs::rename(&tmp, path).map_err(map_err)?;
    Ok(())
}
