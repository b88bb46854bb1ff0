//! Per-epoch training metrics with resume-safe persistence.

use crate::error::Result;
use crate::persistence;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the persisted metrics, inside the experiment directory.
pub const METRICS_FILE: &str = "metrics.json";

/// One epoch's results as reported by the trainer collaborator.
///
/// Validation fields are `None` when the experiment trains on the full
/// corpus (`split_ratio` of 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub valid_loss: Option<f64>,
    pub valid_accuracy: Option<f64>,
}

/// Accumulated training metrics for an experiment.
///
/// Persisted after every epoch so a resumed run continues the histories
/// instead of starting over. Validation histories grow only on epochs that
/// report validation, which is uniform within a run because the split ratio
/// is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs_completed: usize,
    pub train_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub valid_loss: Vec<f64>,
    pub valid_accuracy: Vec<f64>,
    /// 1-based epoch with the lowest monitored loss so far.
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
    pub total_training_secs: f64,
}

impl TrainingMetrics {
    /// Record one epoch. Returns whether it set a new best.
    ///
    /// The monitored loss is validation loss when available, training loss
    /// otherwise.
    pub fn record_epoch(&mut self, report: &EpochReport, duration_secs: f64) -> bool {
        self.train_loss.push(report.train_loss);
        self.train_accuracy.push(report.train_accuracy);
        if let Some(loss) = report.valid_loss {
            self.valid_loss.push(loss);
        }
        if let Some(accuracy) = report.valid_accuracy {
            self.valid_accuracy.push(accuracy);
        }
        self.epochs_completed += 1;
        self.total_training_secs += duration_secs;

        let monitored = report.valid_loss.unwrap_or(report.train_loss);
        let is_best = self.best_loss.is_none_or(|best| monitored < best);
        if is_best {
            self.best_loss = Some(monitored);
            self.best_epoch = Some(self.epochs_completed);
        }
        is_best
    }

    /// Drop everything recorded after `epoch` and recompute the best entry.
    ///
    /// Used when resuming from a checkpoint older than the metrics file,
    /// so histories stay aligned with the restored model state.
    pub fn truncate_to(&mut self, epoch: usize) {
        if epoch >= self.epochs_completed {
            return;
        }
        self.train_loss.truncate(epoch);
        self.train_accuracy.truncate(epoch);
        self.valid_loss.truncate(epoch);
        self.valid_accuracy.truncate(epoch);
        self.epochs_completed = epoch;

        self.best_epoch = None;
        self.best_loss = None;
        for (i, &train) in self.train_loss.iter().enumerate() {
            let monitored = self.valid_loss.get(i).copied().unwrap_or(train);
            if self.best_loss.is_none_or(|best| monitored < best) {
                self.best_loss = Some(monitored);
                self.best_epoch = Some(i + 1);
            }
        }
    }

    /// Load the metrics persisted under `experiment_root`, or a fresh record
    /// if none exist yet.
    pub fn load(experiment_root: &Path) -> Result<Self> {
        Ok(persistence::load_json(&experiment_root.join(METRICS_FILE))?.unwrap_or_default())
    }

    /// Persist the metrics under `experiment_root`.
    pub fn save(&self, experiment_root: &Path) -> Result<()> {
        persistence::atomic_write_json(&experiment_root.join(METRICS_FILE), self)
    }
}
