//! Prediction collaborator contract and evaluation recipes.

use crate::config::RunnerOptions;
use crate::data::{DataProvider, EvalData, Mode, PredictContext, TextBatch, Tokenizer};
use crate::error::{LabError, Result};
use crate::registry::Experiment;
use crate::training::checkpoint::{Checkpoint, CheckpointManager};
use crate::training::runner::TrainPlan;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// External prediction collaborator.
///
/// Owns the model math; the lab owns checkpoint selection and the mapping
/// between class indices and label strings.
pub trait Predictor {
    /// Rebuild model state from a checkpoint's weights.
    fn restore(&mut self, plan: &TrainPlan, checkpoint: &Checkpoint) -> Result<()>;

    /// Predict the class index of one token sequence.
    fn predict(&self, sequence: &[u32]) -> Result<usize>;

    /// Predict a whole batch. The default maps [`Predictor::predict`] over
    /// the sequences.
    fn predict_batch(&self, batch: &TextBatch) -> Result<Vec<usize>> {
        batch
            .sequences
            .iter()
            .map(|sequence| self.predict(sequence))
            .collect()
    }
}

/// Per-class precision, recall, and F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true examples of this class.
    pub support: usize,
}

/// Counting-based evaluation summary over a held-out corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassStats>,
    /// `confusion[truth][predicted]`.
    pub confusion: Vec<Vec<usize>>,
}

impl ClassificationReport {
    /// Derive all ratios from a filled confusion matrix.
    pub fn from_confusion(confusion: Vec<Vec<usize>>, classes: &[String]) -> Self {
        let k = classes.len();
        let total: usize = confusion.iter().flatten().sum();
        let correct: usize = (0..k).map(|i| confusion[i][i]).sum();

        let mut per_class = Vec::with_capacity(k);
        for (i, label) in classes.iter().enumerate() {
            let true_positives = confusion[i][i];
            let support: usize = confusion[i].iter().sum();
            let predicted: usize = confusion.iter().map(|row| row[i]).sum();
            let precision = ratio(true_positives, predicted);
            let recall = ratio(true_positives, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            per_class.push(ClassStats {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            });
        }

        let mean = |f: fn(&ClassStats) -> f64| {
            if per_class.is_empty() {
                0.0
            } else {
                per_class.iter().map(f).sum::<f64>() / per_class.len() as f64
            }
        };

        Self {
            total,
            correct,
            accuracy: ratio(correct, total),
            macro_precision: mean(|s| s.precision),
            macro_recall: mean(|s| s.recall),
            macro_f1: mean(|s| s.f1),
            per_class,
            confusion,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluate a restored predictor over held-out batches.
pub fn evaluate(predictor: &dyn Predictor, data: &EvalData) -> Result<ClassificationReport> {
    if data.classes.is_empty() {
        return Err(LabError::dataset("evaluation data has no classes"));
    }
    let k = data.classes.len();
    let mut confusion = vec![vec![0usize; k]; k];

    for batch in &data.batches {
        if batch.sequences.len() != batch.labels.len() {
            return Err(LabError::dataset(format!(
                "batch has {} sequences but {} labels",
                batch.sequences.len(),
                batch.labels.len(),
            )));
        }
        let predictions = predictor.predict_batch(batch)?;
        if predictions.len() != batch.labels.len() {
            return Err(LabError::prediction(format!(
                "predictor returned {} results for {} sequences",
                predictions.len(),
                batch.labels.len(),
            )));
        }
        for (&truth, &predicted) in batch.labels.iter().zip(&predictions) {
            if truth >= k {
                return Err(LabError::dataset(format!(
                    "label {truth} out of range for {k} classes"
                )));
            }
            if predicted >= k {
                return Err(LabError::prediction(format!(
                    "predicted class {predicted} out of range for {k} classes"
                )));
            }
            confusion[truth][predicted] += 1;
        }
    }

    Ok(ClassificationReport::from_confusion(confusion, &data.classes))
}

/// Restore `predictor` from the best recorded checkpoint of `experiment`.
pub fn restore_best(experiment: &Experiment, predictor: &mut dyn Predictor) -> Result<Checkpoint> {
    let plan = TrainPlan::from(experiment);
    let manager = CheckpointManager::for_experiment(experiment, &RunnerOptions::default());
    let checkpoint = manager.best()?.ok_or_else(|| {
        LabError::checkpoint(format!(
            "no checkpoints recorded for '{}'",
            experiment.config.name,
        ))
    })?;
    predictor.restore(&plan, &checkpoint)?;
    Ok(checkpoint)
}

/// Held-out test evaluation of a trained experiment: load test data,
/// restore the best checkpoint, and score every batch.
pub fn run_test(
    experiment: &Experiment,
    provider: &dyn DataProvider,
    predictor: &mut dyn Predictor,
) -> Result<ClassificationReport> {
    let data = provider.load(&experiment.config, Mode::Test)?.into_eval()?;
    let checkpoint = restore_best(experiment, predictor)?;
    let report = evaluate(&*predictor, &data)?;
    info!(
        name = %experiment.config.name,
        from_epoch = checkpoint.epoch,
        total = report.total,
        accuracy = report.accuracy,
        macro_f1 = report.macro_f1,
        "test evaluation complete",
    );
    Ok(report)
}

/// A single phrase prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedLabel {
    pub class_index: usize,
    pub label: String,
    pub tokens: Vec<String>,
}

/// Predict the sentiment of one raw phrase using an already restored
/// predictor.
pub fn predict_phrase(
    predictor: &dyn Predictor,
    tokenizer: &dyn Tokenizer,
    context: &PredictContext,
    phrase: &str,
) -> Result<PredictedLabel> {
    let tokens = tokenizer.tokenize(phrase);
    if tokens.is_empty() {
        return Err(LabError::prediction(format!(
            "phrase {phrase:?} produced no tokens"
        )));
    }
    let sequence = context.index_tokens(&tokens);
    let class_index = predictor.predict(&sequence)?;
    let label = context.classes.get(class_index).cloned().ok_or_else(|| {
        LabError::prediction(format!(
            "predicted class {class_index} out of range for {} classes",
            context.classes.len(),
        ))
    })?;
    Ok(PredictedLabel {
        class_index,
        label,
        tokens,
    })
}

/// Manual prediction of one phrase against a trained experiment.
pub fn run_manual_predict(
    experiment: &Experiment,
    provider: &dyn DataProvider,
    predictor: &mut dyn Predictor,
    tokenizer: &dyn Tokenizer,
    phrase: &str,
) -> Result<PredictedLabel> {
    let started = Instant::now();
    let context = provider
        .load(&experiment.config, Mode::Predict)?
        .into_predict()?;
    restore_best(experiment, predictor)?;
    let predicted = predict_phrase(&*predictor, tokenizer, &context, phrase)?;
    info!(
        name = %experiment.config.name,
        label = %predicted.label,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "manual prediction complete",
    );
    Ok(predicted)
}
