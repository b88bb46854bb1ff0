//! Error types for experiment lifecycle and orchestration.

use thiserror::Error;

/// Errors that can occur while managing or running experiments.
#[derive(Error, Debug)]
pub enum LabError {
    /// Configuration or hyperparameter validation failure.
    #[error("Config error: {0}")]
    Config(String),

    /// An experiment name that does not follow the naming scheme.
    #[error("Invalid experiment name: {0}")]
    InvalidName(String),

    /// Creation attempted for a name that already has a directory.
    #[error("Experiment already exists: {0}")]
    AlreadyExists(String),

    /// Resume attempted for a name with no directory.
    #[error("Experiment not found: {0}")]
    NotFound(String),

    /// Data provider or corpus file failure.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Trainer collaborator failure.
    #[error("Training error: {0}")]
    Training(String),

    /// Checkpoint manifest or weights file failure.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Predictor collaborator failure.
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LabError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-name error.
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Create a dataset error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Create a training error.
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a prediction error.
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }
}

/// Result type for lab operations.
pub type Result<T> = std::result::Result<T, LabError>;
