//! # sentilab — experiment lifecycle for tweet sentiment models
//!
//! Filesystem-backed management of training experiments for the two
//! sentiment tasks of this project (primary tweets and post-replies), plus
//! the orchestration recipes that drive external collaborators through
//! them:
//!
//! - **Experiment registry**: one directory per experiment, keyed by a name
//!   derived from the distinguishing hyperparameters, with create / resume /
//!   delete semantics ([`registry`]).
//! - **Name codec**: experiment names encode profile, optimizer, learning
//!   rate, and vocabulary cap, and parse back into full hyperparameter sets
//!   ([`params`]).
//! - **Training runner**: create-or-resume epoch loop over a trainer
//!   collaborator, with checkpoint retention and persisted metrics
//!   ([`training`]).
//! - **Sweeps**: grid and random search expansion over the name-keyed
//!   parameters ([`training::sweep`]).
//! - **Inference recipes**: held-out evaluation, manual phrase prediction,
//!   and the reply-labeling pipeline ([`inference`]).
//!
//! The numeric side (models, tokenization, embeddings) lives behind the
//! [`data::DataProvider`], [`training::ModelTrainer`], and
//! [`inference::Predictor`] traits; this crate never does tensor math.
//!
//! On disk an experiment looks like:
//!
//! ```text
//! experiments/
//!   Adam_lr0.0001_max_vocab_size50000/
//!     config.json        hyperparameters + artifact paths
//!     metrics.json       per-epoch histories
//!     checkpoints/       weights + checkpoints.json manifest
//!     logs/              run artifacts
//! ```
//!
//! All operations are synchronous and single-process; callers wanting
//! parallel sweeps run one process per experiment directory.

pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod params;
pub mod persistence;
pub mod registry;
pub mod training;

pub use config::{ArtifactPaths, LabConfig, ReplyFiles, ReplySource, RunnerOptions};
pub use data::{DataBundle, DataProvider, Mode, Tokenizer, WhitespaceTokenizer};
pub use error::{LabError, Result};
pub use inference::{ClassificationReport, PredictedLabel, Predictor};
pub use params::{
    HyperparamSet, LossKind, ModelVariant, NameKey, OptimizerSpec, TaskProfile, experiment_name,
    parse_experiment_name,
};
pub use registry::{Experiment, ExperimentConfig, ExperimentRegistry, OpenMode};
pub use training::{
    Checkpoint, CheckpointManager, EpochReport, ModelTrainer, TrainPlan, TrainingMetrics,
    TrainingRunner,
};
