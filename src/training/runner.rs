//! Training orchestration over the external trainer collaborator.

use crate::config::RunnerOptions;
use crate::data::{DataProvider, Mode, TrainData};
use crate::error::Result;
use crate::params::{HyperparamSet, TaskProfile};
use crate::registry::Experiment;
use crate::training::checkpoint::{Checkpoint, CheckpointManager};
use crate::training::metrics::{EpochReport, TrainingMetrics};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Immutable view of an experiment handed to collaborators.
#[derive(Debug, Clone)]
pub struct TrainPlan {
    pub name: String,
    pub profile: TaskProfile,
    pub params: HyperparamSet,
}

impl From<&Experiment> for TrainPlan {
    fn from(experiment: &Experiment) -> Self {
        Self {
            name: experiment.config.name.clone(),
            profile: experiment.config.profile,
            params: experiment.config.params.clone(),
        }
    }
}

/// External model-training collaborator.
///
/// Owns the model, optimizer, and loss math. The runner only decides when
/// to call what: `setup` initializes fresh state from the plan, `restore`
/// rebuilds state from a previously saved checkpoint.
pub trait ModelTrainer {
    fn setup(&mut self, plan: &TrainPlan, data: &TrainData) -> Result<()>;

    fn restore(
        &mut self,
        plan: &TrainPlan,
        data: &TrainData,
        checkpoint: &Checkpoint,
    ) -> Result<()>;

    /// Run one pass over the training split. `epoch` is 1-based.
    fn run_epoch(&mut self, epoch: usize, data: &TrainData) -> Result<EpochReport>;

    /// Write the current weights to `path`.
    fn save_weights(&self, path: &Path) -> Result<()>;
}

/// Drives the create-or-resume training recipe for one experiment.
pub struct TrainingRunner {
    options: RunnerOptions,
}

impl TrainingRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    /// Train `experiment` up to its configured epoch count.
    ///
    /// If checkpoints exist, the trainer is restored from the latest one and
    /// the loop continues after its epoch; otherwise training starts fresh.
    /// Metrics are persisted after every epoch, checkpoints on the configured
    /// cadence and additionally whenever an epoch sets a new best loss.
    pub fn train(
        &self,
        experiment: &Experiment,
        provider: &dyn DataProvider,
        trainer: &mut dyn ModelTrainer,
    ) -> Result<TrainingMetrics> {
        self.options.validate()?;
        let plan = TrainPlan::from(experiment);
        let data = provider.load(&experiment.config, Mode::Train)?.into_train()?;
        info!(
            name = %plan.name,
            train_batches = data.train.len(),
            valid_batches = data.valid.len(),
            vocab_size = data.vocab.vocab_size,
            "prepared training data",
        );

        let manager = CheckpointManager::for_experiment(experiment, &self.options);
        let mut metrics = TrainingMetrics::load(&experiment.paths.root)?;

        let start_epoch = match manager.latest()? {
            Some(checkpoint) => {
                trainer.restore(&plan, &data, &checkpoint)?;
                // Histories past the restored epoch describe weights that no
                // longer exist.
                metrics.truncate_to(checkpoint.epoch);
                info!(name = %plan.name, epoch = checkpoint.epoch, "resuming from checkpoint");
                checkpoint.epoch + 1
            }
            None => {
                trainer.setup(&plan, &data)?;
                1
            }
        };

        let total = plan.params.num_epochs;
        if start_epoch > total {
            info!(name = %plan.name, total, "training already complete");
            return Ok(metrics);
        }

        for epoch in start_epoch..=total {
            let started = Instant::now();
            let report = trainer.run_epoch(epoch, &data)?;
            let is_best = metrics.record_epoch(&report, started.elapsed().as_secs_f64());
            info!(
                name = %plan.name,
                epoch,
                total,
                train_loss = report.train_loss,
                valid_loss = ?report.valid_loss,
                is_best,
                "epoch complete",
            );

            if epoch % self.options.checkpoint_every == 0 || is_best {
                let path = manager.weights_path(epoch);
                trainer.save_weights(&path)?;
                let monitored = report.valid_loss.unwrap_or(report.train_loss);
                manager.record(&plan.name, epoch, monitored, &path)?;
            }
            metrics.save(&experiment.paths.root)?;
        }

        info!(
            name = %plan.name,
            epochs = metrics.epochs_completed,
            best_epoch = ?metrics.best_epoch,
            "training complete",
        );
        Ok(metrics)
    }
}
