//! Checkpoint persistence for training runs.
//!
//! Files live directly under the run's log root:
//! `model.epoch_{E}_p.ckpt` for the provisional best and
//! `model.epoch_{E}_f.ckpt` for the final snapshot.

use crate::error::{TrainError, TrainResult};
use crate::model::StateDict;
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "model.epoch_";
const FILE_EXTENSION: &str = "ckpt";

/// Status encoded in the checkpoint file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTag {
    Provisional,
    Final,
}

impl CheckpointTag {
    fn suffix(self) -> &'static str {
        match self {
            CheckpointTag::Provisional => "p",
            CheckpointTag::Final => "f",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "p" => Some(CheckpointTag::Provisional),
            "f" => Some(CheckpointTag::Final),
            _ => None,
        }
    }
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointTag::Provisional => write!(f, "provisional"),
            CheckpointTag::Final => write!(f, "final"),
        }
    }
}

/// On-disk checkpoint body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub epoch: usize,
    pub tag: CheckpointTag,
    pub created_at: DateTime<Utc>,
    pub state: StateDict,
}

/// Metadata for a checkpoint on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub tag: CheckpointTag,
    pub path: PathBuf,
    pub hash: String,
    pub size_bytes: u64,
}

/// Writes, prunes and lists checkpoints under one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    base_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_name(epoch: usize, tag: CheckpointTag) -> String {
        format!("{FILE_PREFIX}{epoch}_{}.{FILE_EXTENSION}", tag.suffix())
    }

    /// Parse `model.epoch_{E}_{p|f}.ckpt`.
    pub fn parse_file_name(name: &str) -> Option<(usize, CheckpointTag)> {
        let stem = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?
            .strip_suffix('.')?;
        let (epoch, suffix) = stem.rsplit_once('_')?;
        Some((epoch.parse().ok()?, CheckpointTag::from_suffix(suffix)?))
    }

    pub fn path_for(&self, epoch: usize, tag: CheckpointTag) -> PathBuf {
        self.base_dir.join(Self::file_name(epoch, tag))
    }

    /// Persist a provisional-best checkpoint for `epoch`.
    pub fn save(&self, state: &StateDict, epoch: usize) -> TrainResult<Checkpoint> {
        self.write(state, epoch, CheckpointTag::Provisional)
    }

    /// Persist the terminal checkpoint. Never pruned.
    pub fn save_final(&self, state: &StateDict, epoch: usize) -> TrainResult<Checkpoint> {
        self.write(state, epoch, CheckpointTag::Final)
    }

    /// Delete the provisional checkpoint for `epoch`.
    ///
    /// Absence is not an error; returns whether a file was removed.
    pub fn prune(&self, epoch: usize) -> TrainResult<bool> {
        let path = self.path_for(epoch, CheckpointTag::Provisional);
        persistence::remove_if_exists(&path).map_err(|e| TrainError::checkpoint(path, e))
    }

    /// Load the parameter state of a checkpoint.
    pub fn load(&self, epoch: usize, tag: CheckpointTag) -> TrainResult<StateDict> {
        let path = self.path_for(epoch, tag);
        let file: CheckpointFile = persistence::load_json(&path)
            .map_err(|e| TrainError::checkpoint(&path, e))?
            .ok_or_else(|| {
                TrainError::checkpoint(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "checkpoint not found"),
                )
            })?;
        if file.epoch != epoch || file.tag != tag {
            return Err(TrainError::invalid_input(format!(
                "{} holds epoch {} ({}), expected epoch {epoch} ({tag})",
                path.display(),
                file.epoch,
                file.tag
            )));
        }
        Ok(file.state)
    }

    /// All checkpoints under the base directory, ordered by tag then epoch.
    ///
    /// Entries that are not regular files or cannot be read are skipped.
    pub fn list(&self) -> TrainResult<Vec<Checkpoint>> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrainError::checkpoint(&self.base_dir, e)),
        };

        let mut checkpoints = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some((epoch, tag)) = name.to_str().and_then(Self::parse_file_name) else {
                continue;
            };
            let path = entry.path();
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "Skipping non-file checkpoint entry");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Unreadable checkpoint entry"
                    );
                    continue;
                }
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Unreadable checkpoint entry"
                    );
                    continue;
                }
            };
            checkpoints.push(Checkpoint {
                epoch,
                tag,
                hash: hash_bytes(&bytes),
                size_bytes: bytes.len() as u64,
                path,
            });
        }
        checkpoints.sort_by_key(|c| (c.tag == CheckpointTag::Final, c.epoch));
        Ok(checkpoints)
    }

    /// Provisional checkpoints currently on disk.
    pub fn provisional(&self) -> TrainResult<Vec<Checkpoint>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.tag == CheckpointTag::Provisional)
            .collect())
    }

    fn write(
        &self,
        state: &StateDict,
        epoch: usize,
        tag: CheckpointTag,
    ) -> TrainResult<Checkpoint> {
        let path = self.path_for(epoch, tag);
        let body = CheckpointFile {
            epoch,
            tag,
            created_at: Utc::now(),
            state: state.clone(),
        };
        let bytes = persistence::atomic_write_json(&path, &body)
            .map_err(|e| TrainError::checkpoint(&path, e))?;
        Ok(Checkpoint {
            epoch,
            tag,
            hash: hash_bytes(&bytes),
            size_bytes: bytes.len() as u64,
            path,
        })
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
