//! Lab-level configuration: directory roots, runner options, and the data
//! artifacts each experiment reads and writes.

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a lab instance.
///
/// `experiments_dir` is the registry root (one subdirectory per experiment),
/// `data_dir` holds the shared corpora the collaborators read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default = "default_experiments_dir")]
    pub experiments_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub runner: RunnerOptions,
}

/// Checkpoint cadence and retention for training runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerOptions {
    /// Write a checkpoint every N epochs.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// Keep at most this many checkpoints per experiment.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,
}

fn default_experiments_dir() -> PathBuf {
    PathBuf::from(".sentilab/experiments")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".sentilab/data")
}

fn default_checkpoint_every() -> usize {
    1
}

fn default_max_checkpoints() -> usize {
    5
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            experiments_dir: default_experiments_dir(),
            data_dir: default_data_dir(),
            runner: RunnerOptions::default(),
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            max_checkpoints: default_max_checkpoints(),
        }
    }
}

impl LabConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.experiments_dir.as_os_str().is_empty() {
            return Err(LabError::config("experiments_dir must not be empty"));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(LabError::config("data_dir must not be empty"));
        }
        self.runner.validate()
    }
}

impl RunnerOptions {
    /// Validate the runner options.
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_every == 0 {
            return Err(LabError::config("checkpoint_every must be at least 1"));
        }
        if self.max_checkpoints == 0 {
            return Err(LabError::config("max_checkpoints must be at least 1"));
        }
        Ok(())
    }
}

/// Which reply corpus a labeling run draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    GetOldTweet,
    Philipp,
}

/// The raw / labeled / summarized file triple for one reply corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFiles {
    /// Scraped replies without sentiment labels.
    pub raw: PathBuf,
    /// Same rows with a predicted label per reply.
    pub labeled: PathBuf,
    /// One labeled row per distinct tweet, repetitions collapsed.
    pub summarized: PathBuf,
}

/// Data artifacts an experiment reads and writes.
///
/// Persisted inside `config.json` so a resumed experiment sees the same
/// corpora it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Labeled tweets used for training (and validation after the split).
    pub train_file: PathBuf,
    /// Held-out labeled tweets used for test evaluation.
    pub test_file: PathBuf,
    /// Reply corpus scraped with GetOldTweets.
    pub getoldtweet: ReplyFiles,
    /// Reply corpus from the Philipp collection.
    pub philipp: ReplyFiles,
}

impl ArtifactPaths {
    /// Default artifact layout rooted at `data_dir`.
    pub fn defaults_in(data_dir: &Path) -> Self {
        let replies = data_dir.join("replies");
        Self {
            train_file: data_dir.join("train_tweets.csv"),
            test_file: data_dir.join("test_tweets.csv"),
            getoldtweet: ReplyFiles {
                raw: replies.join("getoldtweet_replies.csv"),
                labeled: replies.join("getoldtweet_replies_labeled.csv"),
                summarized: replies.join("getoldtweet_post_reply.csv"),
            },
            philipp: ReplyFiles {
                raw: replies.join("philipp_replies.csv"),
                labeled: replies.join("philipp_replies_labeled.csv"),
                summarized: replies.join("philipp_post_reply.csv"),
            },
        }
    }

    /// The file triple for `source`.
    pub fn reply_files(&self, source: ReplySource) -> &ReplyFiles {
        match source {
            ReplySource::GetOldTweet => &self.getoldtweet,
            ReplySource::Philipp => &self.philipp,
        }
    }
}
