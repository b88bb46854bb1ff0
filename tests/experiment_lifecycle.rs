//! End-to-end lifecycle tests: registry, training runner, evaluation, and
//! the reply-labeling pipeline, wired to rule-based mock collaborators.

use pretty_assertions::assert_eq;
use sentilab::data::{EmbeddingMatrix, EvalData, PredictContext, TextBatch, TrainData, VocabInfo};
use sentilab::inference::{label_replies, run_manual_predict, run_test};
use sentilab::training::{create_all, delete_all, Checkpoint, CheckpointManager, ParamGrid};
use sentilab::{
    DataBundle, DataProvider, EpochReport, Experiment, ExperimentConfig, ExperimentRegistry,
    HyperparamSet, LabError, Mode, ModelTrainer, OpenMode, Predictor, ReplySource, Result,
    RunnerOptions, TaskProfile, TrainPlan, TrainingRunner, WhitespaceTokenizer,
    parse_experiment_name,
};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

const WORDS: [&str; 7] = ["<pad>", "<unk>", "love", "great", "awful", "bad", "fine"];
const CLASSES: [&str; 3] = ["negative", "neutral", "positive"];

const NEGATIVE: usize = 0;
const NEUTRAL: usize = 1;
const POSITIVE: usize = 2;

fn vocab_index() -> HashMap<String, u32> {
    WORDS
        .iter()
        .enumerate()
        .map(|(i, word)| (word.to_string(), i as u32))
        .collect()
}

fn vocab_info() -> VocabInfo {
    VocabInfo {
        vocab_size: WORDS.len(),
        pad_idx: 0,
        unk_idx: 1,
    }
}

fn classes() -> Vec<String> {
    CLASSES.iter().map(|c| c.to_string()).collect()
}

fn batch(rows: &[(&[u32], usize)]) -> TextBatch {
    TextBatch {
        sequences: rows.iter().map(|(seq, _)| seq.to_vec()).collect(),
        labels: rows.iter().map(|(_, label)| *label).collect(),
    }
}

/// Serves a fixed corpus over the shared toy vocabulary.
struct SentimentProvider;

impl DataProvider for SentimentProvider {
    fn load(&self, _config: &ExperimentConfig, mode: Mode) -> Result<DataBundle> {
        let bundle = match mode {
            Mode::Train => DataBundle::Train(TrainData {
                train: vec![
                    batch(&[(&[2, 3], POSITIVE), (&[4], NEGATIVE)]),
                    batch(&[(&[6], NEUTRAL), (&[5, 5], NEGATIVE)]),
                ],
                valid: vec![batch(&[(&[2], POSITIVE)])],
                vocab: vocab_info(),
                embeddings: EmbeddingMatrix::zeroed(WORDS.len(), 4),
                class_weights: vec![1.0, 1.0, 1.0],
                classes: classes(),
            }),
            Mode::Test => DataBundle::Eval(EvalData {
                batches: vec![
                    batch(&[(&[2, 3], POSITIVE), (&[4, 5], NEGATIVE), (&[6], NEUTRAL)]),
                    // One mislabeled row the rule predictor gets wrong.
                    batch(&[(&[5], NEGATIVE), (&[2], NEGATIVE)]),
                ],
                vocab: vocab_info(),
                embeddings: EmbeddingMatrix::zeroed(WORDS.len(), 4),
                classes: classes(),
            }),
            Mode::Predict | Mode::ReplyPredict => DataBundle::Predict(PredictContext {
                vocab_index: vocab_index(),
                vocab: vocab_info(),
                embeddings: EmbeddingMatrix::zeroed(WORDS.len(), 4),
                classes: classes(),
            }),
        };
        Ok(bundle)
    }
}

/// Loss shrinks every epoch; weights are a marker file.
#[derive(Default)]
struct RuleTrainer {
    setup_calls: usize,
    restored_from: Option<usize>,
}

impl ModelTrainer for RuleTrainer {
    fn setup(&mut self, _plan: &TrainPlan, _data: &TrainData) -> Result<()> {
        self.setup_calls += 1;
        Ok(())
    }

    fn restore(
        &mut self,
        _plan: &TrainPlan,
        _data: &TrainData,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        self.restored_from = Some(checkpoint.epoch);
        Ok(())
    }

    fn run_epoch(&mut self, epoch: usize, _data: &TrainData) -> Result<EpochReport> {
        let loss = 1.0 / epoch as f64;
        Ok(EpochReport {
            train_loss: loss,
            train_accuracy: 1.0 - loss / 4.0,
            valid_loss: Some(loss * 1.1),
            valid_accuracy: Some(1.0 - loss / 2.0),
        })
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        std::fs::write(path, b"rule-trainer-weights")?;
        Ok(())
    }
}

/// Keyword rules: positive words win over negative, anything else neutral.
#[derive(Default)]
struct RulePredictor {
    restored_from: Option<usize>,
}

impl Predictor for RulePredictor {
    fn restore(&mut self, _plan: &TrainPlan, checkpoint: &Checkpoint) -> Result<()> {
        self.restored_from = Some(checkpoint.epoch);
        Ok(())
    }

    fn predict(&self, sequence: &[u32]) -> Result<usize> {
        if sequence.iter().any(|&t| t == 2 || t == 3) {
            Ok(POSITIVE)
        } else if sequence.iter().any(|&t| t == 4 || t == 5) {
            Ok(NEGATIVE)
        } else {
            Ok(NEUTRAL)
        }
    }
}

fn lab(dir: &TempDir) -> ExperimentRegistry {
    ExperimentRegistry::new(dir.path().join("experiments"), dir.path().join("data"))
}

fn small_experiment(registry: &ExperimentRegistry, num_epochs: usize) -> Experiment {
    let mut params = HyperparamSet::defaults(TaskProfile::Primary);
    params.num_epochs = num_epochs;
    registry
        .create_with(TaskProfile::Primary, params)
        .unwrap()
}

#[test]
fn full_lifecycle_train_resume_evaluate() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let experiment = small_experiment(&registry, 3);
    let runner = TrainingRunner::new(RunnerOptions::default());

    let mut trainer = RuleTrainer::default();
    let metrics = runner
        .train(&experiment, &SentimentProvider, &mut trainer)
        .unwrap();
    assert_eq!(trainer.setup_calls, 1);
    assert_eq!(metrics.epochs_completed, 3);
    assert_eq!(metrics.best_epoch, Some(3));
    assert_eq!(metrics.train_loss.len(), 3);
    assert_eq!(metrics.valid_loss.len(), 3);

    // Reopening and training again restores instead of restarting.
    let reopened = registry
        .open(&experiment.config.name, OpenMode::Resume)
        .unwrap();
    assert_eq!(reopened.config, experiment.config);
    let mut resumed_trainer = RuleTrainer::default();
    let resumed_metrics = runner
        .train(&reopened, &SentimentProvider, &mut resumed_trainer)
        .unwrap();
    assert_eq!(resumed_trainer.setup_calls, 0);
    assert_eq!(resumed_trainer.restored_from, Some(3));
    assert_eq!(resumed_metrics, metrics);

    // Test evaluation restores the best checkpoint and scores the corpus.
    let mut predictor = RulePredictor::default();
    let report = run_test(&reopened, &SentimentProvider, &mut predictor).unwrap();
    assert_eq!(predictor.restored_from, Some(3));
    assert_eq!(report.total, 5);
    assert_eq!(report.correct, 4);
    assert_eq!(report.accuracy, 0.8);

    let summary = registry.summary(&experiment.config.name).unwrap();
    assert_eq!(summary.num_checkpoints, 3);
    assert!(summary.disk_bytes > 0);
}

#[test]
fn name_derivation_survives_create_and_resume() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let name = "POSTREPLY_Adam_lr0.0009_max_vocab_size50000";

    let created = registry.open(name, OpenMode::Create).unwrap();
    assert_eq!(created.config.profile, TaskProfile::PostReply);

    let resumed = registry.open(name, OpenMode::Resume).unwrap();
    assert_eq!(resumed.config, created.config);

    let rederived = parse_experiment_name(name)
        .unwrap()
        .into_params()
        .unwrap();
    assert_eq!(resumed.config.params, rederived);
}

#[test]
fn create_resume_delete_contract() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let name = "Adam_lr0.0001_max_vocab_size50000";

    assert!(matches!(
        registry.open(name, OpenMode::Resume),
        Err(LabError::NotFound(_)),
    ));
    registry.open(name, OpenMode::Create).unwrap();
    assert!(matches!(
        registry.open(name, OpenMode::Create),
        Err(LabError::AlreadyExists(_)),
    ));

    assert!(registry.delete(name).unwrap());
    assert!(!registry.delete(name).unwrap());
    assert!(matches!(
        registry.open(name, OpenMode::Resume),
        Err(LabError::NotFound(_)),
    ));
}

#[test]
fn sweep_grid_creates_and_deletes_every_combination() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let grid = ParamGrid {
        learning_rates: vec![1e-4, 5e-4],
        max_vocab_sizes: vec![25_000, 50_000],
    };

    let created = create_all(
        &registry,
        TaskProfile::Primary,
        &grid.param_sets(TaskProfile::Primary),
    )
    .unwrap();
    assert_eq!(created.len(), 4);
    for experiment in &created {
        assert!(registry.exists(&experiment.config.name));
        // Every generated name parses back to its own parameters.
        let key = parse_experiment_name(&experiment.config.name).unwrap();
        assert_eq!(key.max_vocab_size, experiment.config.params.max_vocab_size);
    }

    assert_eq!(
        delete_all(&registry, TaskProfile::Primary, &grid).unwrap(),
        4,
    );
    assert_eq!(delete_all(&registry, TaskProfile::Primary, &grid).unwrap(), 0);
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn manual_prediction_uses_best_checkpoint() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let experiment = small_experiment(&registry, 2);
    let runner = TrainingRunner::new(RunnerOptions::default());
    runner
        .train(&experiment, &SentimentProvider, &mut RuleTrainer::default())
        .unwrap();

    let mut predictor = RulePredictor::default();
    let predicted = run_manual_predict(
        &experiment,
        &SentimentProvider,
        &mut predictor,
        &WhitespaceTokenizer,
        "love this great day",
    )
    .unwrap();
    assert_eq!(predicted.label, "positive");
    assert_eq!(predictor.restored_from, Some(2));

    // Unknown vocabulary maps to unk and stays neutral.
    let neutral = run_manual_predict(
        &experiment,
        &SentimentProvider,
        &mut RulePredictor::default(),
        &WhitespaceTokenizer,
        "entirely unseen words",
    )
    .unwrap();
    assert_eq!(neutral.label, "neutral");
}

#[test]
fn prediction_without_checkpoints_fails() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let experiment = small_experiment(&registry, 2);

    let err = run_manual_predict(
        &experiment,
        &SentimentProvider,
        &mut RulePredictor::default(),
        &WhitespaceTokenizer,
        "love",
    )
    .unwrap_err();
    assert!(matches!(err, LabError::Checkpoint(_)));
}

#[test]
fn reply_pipeline_labels_and_summarizes() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let experiment = small_experiment(&registry, 2);
    let runner = TrainingRunner::new(RunnerOptions::default());
    runner
        .train(&experiment, &SentimentProvider, &mut RuleTrainer::default())
        .unwrap();

    let files = experiment
        .config
        .artifacts
        .reply_files(ReplySource::GetOldTweet)
        .clone();
    std::fs::create_dir_all(files.raw.parent().unwrap()).unwrap();
    std::fs::write(
        &files.raw,
        "tweet,id,user,reply\n\
         Big announcement,100,alice,love it\n\
         Big announcement,100,bob,so great\n\
         Big announcement,100,carol,awful\n\
         Other news,200,dave,bad news\n",
    )
    .unwrap();

    let mut predictor = RulePredictor::default();
    let report = label_replies(
        &experiment,
        &SentimentProvider,
        &mut predictor,
        &WhitespaceTokenizer,
        ReplySource::GetOldTweet,
    )
    .unwrap();
    assert_eq!(report.replies_labeled, 4);
    assert_eq!(report.tweets_written, 2);

    let labeled = sentilab::inference::read_reply_csv(&files.labeled).unwrap();
    assert_eq!(labeled.len(), 4);
    assert_eq!(labeled[0].label.as_deref(), Some("positive"));
    assert_eq!(labeled[2].label.as_deref(), Some("negative"));

    let summarized = std::fs::read_to_string(&files.summarized).unwrap();
    assert_eq!(
        summarized,
        "label,tweet\npositive,Big announcement\nnegative,Other news\n",
    );
}

#[test]
fn checkpoint_retention_keeps_best_under_cap() {
    let dir = TempDir::new().unwrap();
    let registry = lab(&dir);
    let experiment = small_experiment(&registry, 6);
    let options = RunnerOptions {
        checkpoint_every: 1,
        max_checkpoints: 3,
    };
    let runner = TrainingRunner::new(options);
    runner
        .train(&experiment, &SentimentProvider, &mut RuleTrainer::default())
        .unwrap();

    let manager = CheckpointManager::for_experiment(&experiment, &options);
    let checkpoints = manager.list().unwrap();
    assert_eq!(checkpoints.len(), 3);
    // Loss shrinks every epoch, so the best checkpoint is the last one and
    // retention keeps a window ending at it.
    let epochs: Vec<usize> = checkpoints.iter().map(|c| c.epoch).collect();
    assert_eq!(epochs, vec![4, 5, 6]);
    assert_eq!(manager.best().unwrap().unwrap().epoch, 6);
}
