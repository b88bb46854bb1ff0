//! Hyperparameter sets, task profiles, and the experiment-name codec.
//!
//! Experiment names are derived from the hyperparameters that distinguish
//! runs, so the key parameters of any experiment can be recovered from its
//! directory name alone:
//!
//! ```text
//! {PROFILE_PREFIX}{OptimizerTag}_lr{learning_rate}_max_vocab_size{cap}
//!
//! Adam_lr0.0001_max_vocab_size50000            (primary profile)
//! POSTREPLY_Adam_lr0.0009_max_vocab_size50000  (post-reply profile)
//! ```
//!
//! Learning rates are rendered with Rust's shortest round-trip float
//! formatting. The parser also accepts exponent spellings such as `5e-05`,
//! which map to the same value but re-render in canonical form.

use crate::error::{LabError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task variant: primary tweet sentiment or post-reply sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskProfile {
    Primary,
    PostReply,
}

impl TaskProfile {
    /// Prefix this profile contributes to experiment names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            Self::Primary => "",
            Self::PostReply => "POSTREPLY_",
        }
    }
}

impl fmt::Display for TaskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::PostReply => write!(f, "post_reply"),
        }
    }
}

/// Optimizer specification handed to the trainer collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam { learning_rate: f64, weight_decay: f64 },
    Sgd { learning_rate: f64, momentum: f64 },
}

impl OptimizerSpec {
    /// Tag used in experiment names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Adam { .. } => "Adam",
            Self::Sgd { .. } => "SGD",
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Adam { learning_rate, .. } | Self::Sgd { learning_rate, .. } => *learning_rate,
        }
    }
}

/// Loss function handed to the trainer collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    CrossEntropy,
    Nll,
}

/// Model architecture handed to the trainer and predictor collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelVariant {
    BiLstm {
        hidden_dim: usize,
    },
    TextCnn {
        conv_channels: usize,
        filter_sizes: Vec<usize>,
    },
}

/// A validated hyperparameter set. Immutable once an experiment is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparamSet {
    pub optimizer: OptimizerSpec,
    pub loss: LossKind,
    pub batch_size: usize,
    /// Vocabulary cap: the provider keeps the most frequent words up to this.
    pub max_vocab_size: usize,
    pub embedding_dim: usize,
    /// Number of sentiment classes.
    pub output_dim: usize,
    pub num_epochs: usize,
    /// Fraction of the training corpus used for training; the remainder is
    /// validation data. `1.0` disables validation.
    pub split_ratio: f64,
    pub model: ModelVariant,
    pub seed: u64,
}

impl HyperparamSet {
    /// Baseline hyperparameters for `profile`.
    ///
    /// The profiles share everything except learning rate, weight decay,
    /// and split ratio, which the post-reply task tunes separately.
    pub fn defaults(profile: TaskProfile) -> Self {
        let (learning_rate, weight_decay, split_ratio) = match profile {
            TaskProfile::Primary => (1e-4, 1e-5, 0.85),
            TaskProfile::PostReply => (9e-4, 1e-4, 0.9),
        };
        Self {
            optimizer: OptimizerSpec::Adam {
                learning_rate,
                weight_decay,
            },
            loss: LossKind::CrossEntropy,
            batch_size: 256,
            max_vocab_size: 50_000,
            embedding_dim: 200,
            output_dim: 3,
            num_epochs: 100,
            split_ratio,
            model: ModelVariant::BiLstm { hidden_dim: 256 },
            seed: 42,
        }
    }

    /// Replace the learning rate, keeping the optimizer kind.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        match &mut self.optimizer {
            OptimizerSpec::Adam { learning_rate: lr, .. }
            | OptimizerSpec::Sgd { learning_rate: lr, .. } => *lr = learning_rate,
        }
        self
    }

    /// Replace the vocabulary cap.
    pub fn with_max_vocab_size(mut self, max_vocab_size: usize) -> Self {
        self.max_vocab_size = max_vocab_size;
        self
    }

    /// Validate the hyperparameter set.
    pub fn validate(&self) -> Result<()> {
        let lr = self.optimizer.learning_rate();
        if !lr.is_finite() || lr <= 0.0 {
            return Err(LabError::config(format!(
                "learning rate must be finite and positive, got {lr}"
            )));
        }
        match self.optimizer {
            OptimizerSpec::Adam { weight_decay, .. } => {
                if !weight_decay.is_finite() || weight_decay < 0.0 {
                    return Err(LabError::config(format!(
                        "weight decay must be finite and non-negative, got {weight_decay}"
                    )));
                }
            }
            OptimizerSpec::Sgd { momentum, .. } => {
                if !momentum.is_finite() || momentum < 0.0 {
                    return Err(LabError::config(format!(
                        "momentum must be finite and non-negative, got {momentum}"
                    )));
                }
            }
        }
        if !self.split_ratio.is_finite() || self.split_ratio <= 0.0 || self.split_ratio > 1.0 {
            return Err(LabError::config(format!(
                "split_ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }
        if self.batch_size == 0 {
            return Err(LabError::config("batch_size must be at least 1"));
        }
        if self.max_vocab_size == 0 {
            return Err(LabError::config("max_vocab_size must be at least 1"));
        }
        if self.embedding_dim == 0 {
            return Err(LabError::config("embedding_dim must be at least 1"));
        }
        if self.output_dim < 2 {
            return Err(LabError::config("output_dim must be at least 2"));
        }
        if self.num_epochs == 0 {
            return Err(LabError::config("num_epochs must be at least 1"));
        }
        match &self.model {
            ModelVariant::BiLstm { hidden_dim } => {
                if *hidden_dim == 0 {
                    return Err(LabError::config("hidden_dim must be at least 1"));
                }
            }
            ModelVariant::TextCnn {
                conv_channels,
                filter_sizes,
            } => {
                if *conv_channels == 0 {
                    return Err(LabError::config("conv_channels must be at least 1"));
                }
                if filter_sizes.is_empty() || filter_sizes.contains(&0) {
                    return Err(LabError::config(
                        "filter_sizes must be non-empty with positive entries",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Derive the canonical experiment name for a hyperparameter set.
pub fn experiment_name(profile: TaskProfile, params: &HyperparamSet) -> String {
    format!(
        "{}{}_lr{}_max_vocab_size{}",
        profile.name_prefix(),
        params.optimizer.tag(),
        params.optimizer.learning_rate(),
        params.max_vocab_size,
    )
}

/// The key hyperparameters recoverable from an experiment name.
#[derive(Debug, Clone, PartialEq)]
pub struct NameKey {
    pub profile: TaskProfile,
    pub optimizer_tag: String,
    pub learning_rate: f64,
    pub max_vocab_size: usize,
}

impl NameKey {
    /// Expand the key into a full hyperparameter set.
    ///
    /// Fields the name does not encode come from the profile defaults.
    pub fn into_params(self) -> Result<HyperparamSet> {
        let defaults = HyperparamSet::defaults(self.profile);
        let optimizer = match self.optimizer_tag.as_str() {
            "Adam" => defaults.optimizer.clone(),
            "SGD" => OptimizerSpec::Sgd {
                learning_rate: self.learning_rate,
                momentum: 0.9,
            },
            tag => {
                return Err(LabError::invalid_name(format!(
                    "unknown optimizer tag '{tag}'"
                )));
            }
        };
        let params = HyperparamSet {
            optimizer,
            ..defaults
        }
        .with_learning_rate(self.learning_rate)
        .with_max_vocab_size(self.max_vocab_size);
        params.validate()?;
        Ok(params)
    }
}

const NAME_PATTERN: &str =
    r"^(POSTREPLY_)?([A-Za-z][A-Za-z0-9]*)_lr([0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)_max_vocab_size([0-9]+)$";

/// Parse an experiment name back into its key hyperparameters.
pub fn parse_experiment_name(name: &str) -> Result<NameKey> {
    let pattern = Regex::new(NAME_PATTERN)
        .map_err(|e| LabError::invalid_name(format!("name pattern failed to compile: {e}")))?;
    let captures = pattern.captures(name).ok_or_else(|| {
        LabError::invalid_name(format!(
            "'{name}' does not match <PREFIX><Optimizer>_lr<rate>_max_vocab_size<cap>"
        ))
    })?;

    let profile = if captures.get(1).is_some() {
        TaskProfile::PostReply
    } else {
        TaskProfile::Primary
    };
    let optimizer_tag = captures[2].to_string();
    let learning_rate: f64 = captures[3]
        .parse()
        .map_err(|_| LabError::invalid_name(format!("unparseable learning rate in '{name}'")))?;
    if !learning_rate.is_finite() || learning_rate <= 0.0 {
        return Err(LabError::invalid_name(format!(
            "learning rate in '{name}' must be finite and positive"
        )));
    }
    let max_vocab_size: usize = captures[4]
        .parse()
        .map_err(|_| LabError::invalid_name(format!("unparseable vocab cap in '{name}'")))?;

    Ok(NameKey {
        profile,
        optimizer_tag,
        learning_rate,
        max_vocab_size,
    })
}
