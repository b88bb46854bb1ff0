//! Training infrastructure: the epoch-loop runner, checkpoint management,
//! persisted metrics, and hyperparameter sweeps.

pub mod checkpoint;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use checkpoint::{Checkpoint, CheckpointManager};
pub use metrics::{EpochReport, TrainingMetrics};
pub use runner::{ModelTrainer, TrainPlan, TrainingRunner};
pub use sweep::{ParamGrid, RandomSearch, SweepStrategy, create_all, delete_all};
