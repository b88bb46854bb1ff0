//! Checkpoint manifest management for training runs.
//!
//! Weights files themselves are written by the trainer collaborator; this
//! module owns the manifest that records them, the naming convention inside
//! an experiment's `checkpoints/` directory, and retention.

use crate::config::RunnerOptions;
use crate::error::Result;
use crate::persistence;
use crate::registry::Experiment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the checkpoint manifest, inside the checkpoint directory.
pub const MANIFEST_FILE: &str = "checkpoints.json";

/// A recorded training checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    /// Name of the experiment this checkpoint belongs to.
    pub experiment: String,
    pub epoch: usize,
    /// Monitored loss at this epoch (validation loss when available).
    pub loss: f64,
    pub path: PathBuf,
    pub hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Manages the checkpoint directory of one experiment.
pub struct CheckpointManager {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, max_checkpoints: usize) -> Self {
        Self {
            dir: dir.into(),
            max_checkpoints,
        }
    }

    pub fn for_experiment(experiment: &Experiment, options: &RunnerOptions) -> Self {
        Self::new(&experiment.paths.checkpoint_dir, options.max_checkpoints)
    }

    /// Where the weights for `epoch` should be written.
    pub fn weights_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("epoch_{epoch:04}.ckpt"))
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// All recorded checkpoints, in recording order.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        Ok(persistence::load_json(&self.manifest_path())?.unwrap_or_default())
    }

    /// The checkpoint with the lowest monitored loss.
    pub fn best(&self) -> Result<Option<Checkpoint>> {
        let checkpoints = self.list()?;
        Ok(checkpoints
            .into_iter()
            .min_by(|a, b| a.loss.partial_cmp(&b.loss).unwrap_or(Ordering::Equal)))
    }

    /// The checkpoint with the highest epoch, used for resuming.
    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        let checkpoints = self.list()?;
        Ok(checkpoints.into_iter().max_by_key(|c| c.epoch))
    }

    /// Record a checkpoint whose weights were just written to `path`.
    ///
    /// Hashes the weights file for later integrity checks, appends to the
    /// manifest, and enforces retention: the oldest entries are evicted
    /// past `max_checkpoints`, but never the best one.
    pub fn record(
        &self,
        experiment: &str,
        epoch: usize,
        loss: f64,
        path: &Path,
    ) -> Result<Checkpoint> {
        std::fs::create_dir_all(&self.dir)?;

        let (hash, size_bytes) = if path.exists() {
            let meta_len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            (hash_file(path)?, meta_len)
        } else {
            // Entry for weights the collaborator stores elsewhere; hash the
            // identifying fields instead of file contents.
            let mut hasher = Sha256::new();
            hasher.update(experiment.as_bytes());
            hasher.update(epoch.to_le_bytes());
            hasher.update(loss.to_le_bytes());
            (format!("{:x}", hasher.finalize()), 0)
        };

        let checkpoint = Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            experiment: experiment.to_string(),
            epoch,
            loss,
            path: path.to_path_buf(),
            hash,
            size_bytes,
            created_at: Utc::now(),
        };

        let mut checkpoints = self.list()?;
        checkpoints.push(checkpoint.clone());
        self.enforce_retention(&mut checkpoints);
        persistence::atomic_write_json(&self.manifest_path(), &checkpoints)?;
        debug!(experiment = %experiment, epoch, loss, "recorded checkpoint");
        Ok(checkpoint)
    }

    /// Evict oldest entries past the cap, sparing the best one.
    fn enforce_retention(&self, checkpoints: &mut Vec<Checkpoint>) {
        while checkpoints.len() > self.max_checkpoints {
            let best = checkpoints
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.loss.partial_cmp(&b.loss).unwrap_or(Ordering::Equal))
                .map(|(i, _)| i);
            // Entries are in recording order, so the first non-best index
            // is the oldest evictable one.
            let Some(evict) = (0..checkpoints.len()).find(|i| Some(*i) != best) else {
                break;
            };
            let removed = checkpoints.remove(evict);
            if removed.path.exists() {
                if let Err(e) = std::fs::remove_file(&removed.path) {
                    warn!(
                        path = %removed.path.display(),
                        error = %e,
                        "could not remove evicted checkpoint file",
                    );
                }
            }
            debug!(epoch = removed.epoch, "evicted checkpoint");
        }
    }
}

fn hash_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
