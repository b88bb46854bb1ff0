//! Data-provider contract: pipeline modes, batch types, and the collaborator
//! traits the lab orchestrates but does not implement.
//!
//! Tokenization, vocabulary construction, embedding lookup, and any numeric
//! preprocessing belong to the provider behind [`DataProvider`]. The lab only
//! moves the resulting bundles between registry, trainer, and predictor.

use crate::error::{LabError, Result};
use crate::registry::ExperimentConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pipeline mode requested from the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Training corpus, split into train and validation.
    Train,
    /// Held-out labeled corpus for evaluation.
    Test,
    /// Vocabulary context for predicting over raw phrases.
    Predict,
    /// Vocabulary context for the reply-labeling pipeline.
    ReplyPredict,
}

/// One batch of numeric token sequences with class labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBatch {
    pub sequences: Vec<Vec<u32>>,
    pub labels: Vec<usize>,
}

impl TextBatch {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Vocabulary bookkeeping produced by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabInfo {
    pub vocab_size: usize,
    pub pad_idx: u32,
    pub unk_idx: u32,
}

/// Row-major pretrained embedding matrix: `rows` vectors of `dim` floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    pub rows: usize,
    pub dim: usize,
    pub weights: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn zeroed(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            weights: vec![0.0; rows * dim],
        }
    }

    /// The embedding vector for token index `row`, if in range.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.dim;
        self.weights.get(start..start + self.dim)
    }
}

/// Everything a trainer needs: batched splits plus vocabulary context.
#[derive(Debug, Clone)]
pub struct TrainData {
    pub train: Vec<TextBatch>,
    /// Empty when `split_ratio` is 1.0.
    pub valid: Vec<TextBatch>,
    pub vocab: VocabInfo,
    pub embeddings: EmbeddingMatrix,
    /// Per-class loss weights for imbalanced corpora.
    pub class_weights: Vec<f32>,
    pub classes: Vec<String>,
}

/// Held-out evaluation input.
#[derive(Debug, Clone)]
pub struct EvalData {
    pub batches: Vec<TextBatch>,
    pub vocab: VocabInfo,
    pub embeddings: EmbeddingMatrix,
    pub classes: Vec<String>,
}

/// Context for predicting over raw text.
#[derive(Debug, Clone)]
pub struct PredictContext {
    /// Word to token-index mapping from the training vocabulary.
    pub vocab_index: HashMap<String, u32>,
    pub vocab: VocabInfo,
    pub embeddings: EmbeddingMatrix,
    pub classes: Vec<String>,
}

impl PredictContext {
    /// Map tokens to indices, falling back to the unknown index for
    /// out-of-vocabulary words.
    pub fn index_tokens(&self, tokens: &[String]) -> Vec<u32> {
        tokens
            .iter()
            .map(|token| {
                self.vocab_index
                    .get(token)
                    .copied()
                    .unwrap_or(self.vocab.unk_idx)
            })
            .collect()
    }
}

/// What a provider returns for a given mode.
#[derive(Debug, Clone)]
pub enum DataBundle {
    Train(TrainData),
    Eval(EvalData),
    Predict(PredictContext),
}

impl DataBundle {
    pub fn into_train(self) -> Result<TrainData> {
        match self {
            Self::Train(data) => Ok(data),
            other => Err(wrong_bundle("train", &other)),
        }
    }

    pub fn into_eval(self) -> Result<EvalData> {
        match self {
            Self::Eval(data) => Ok(data),
            other => Err(wrong_bundle("eval", &other)),
        }
    }

    pub fn into_predict(self) -> Result<PredictContext> {
        match self {
            Self::Predict(context) => Ok(context),
            other => Err(wrong_bundle("predict", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Train(_) => "train",
            Self::Eval(_) => "eval",
            Self::Predict(_) => "predict",
        }
    }
}

fn wrong_bundle(wanted: &str, got: &DataBundle) -> LabError {
    LabError::dataset(format!(
        "provider returned a {} bundle where {wanted} was needed",
        got.kind(),
    ))
}

/// External data pipeline collaborator.
///
/// Implementations own corpus loading, tokenization, vocabulary capping at
/// `config.params.max_vocab_size`, the train/validation split, and the
/// embedding lookup. `mode` selects which bundle variant is produced.
pub trait DataProvider {
    fn load(&self, config: &ExperimentConfig, mode: Mode) -> Result<DataBundle>;
}

/// External text-splitting collaborator.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Minimal whitespace tokenizer, mainly for tests and smoke runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
