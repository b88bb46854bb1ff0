//! Filesystem-backed experiment registry.
//!
//! Every experiment is one directory under the registry root, keyed by its
//! derived name:
//!
//! ```text
//! <root>/
//!   Adam_lr0.0001_max_vocab_size50000/
//!     config.json      persisted ExperimentConfig
//!     checkpoints/     weights + manifest, managed by CheckpointManager
//!     logs/            per-run log artifacts
//! ```
//!
//! Creation claims the directory with `create_dir`, so a name can only be
//! created once; resuming reads back exactly what creation persisted.

use crate::config::{ArtifactPaths, LabConfig};
use crate::error::{LabError, Result};
use crate::params::{HyperparamSet, TaskProfile, experiment_name, parse_experiment_name};
use crate::persistence;
use crate::training::checkpoint::{self, Checkpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the persisted experiment configuration.
pub const CONFIG_FILE: &str = "config.json";
const CHECKPOINT_DIR: &str = "checkpoints";
const LOG_DIR: &str = "logs";

/// How to open an experiment: allocate fresh state or resume persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail if the name already exists.
    Create,
    /// Fail if the name does not exist.
    Resume,
}

/// The persisted record of an experiment, written once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub profile: TaskProfile,
    pub params: HyperparamSet,
    pub artifacts: ArtifactPaths,
    pub created_at: DateTime<Utc>,
}

/// Derived filesystem locations of an experiment. Never persisted, so the
/// registry root can move without invalidating stored configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// An opened experiment: persisted record plus derived paths.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub config: ExperimentConfig,
    pub paths: ExperimentPaths,
}

/// Disk-level overview of one experiment, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub name: String,
    pub profile: TaskProfile,
    pub created_at: DateTime<Utc>,
    pub num_checkpoints: usize,
    pub disk_bytes: u64,
}

/// Registry mapping experiment names to directories under a single root.
#[derive(Debug, Clone)]
pub struct ExperimentRegistry {
    root: PathBuf,
    data_dir: PathBuf,
}

impl ExperimentRegistry {
    pub fn new(root: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(config: &LabConfig) -> Self {
        Self::new(&config.experiments_dir, &config.data_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derived paths for `name`, whether or not it exists yet.
    pub fn paths(&self, name: &str) -> ExperimentPaths {
        let root = self.root.join(name);
        ExperimentPaths {
            config_file: root.join(CONFIG_FILE),
            checkpoint_dir: root.join(CHECKPOINT_DIR),
            log_dir: root.join(LOG_DIR),
            root,
        }
    }

    /// Whether a directory for `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }

    /// Open an experiment in the given mode.
    ///
    /// `Create` derives the hyperparameters from the name itself, persists
    /// them, and fails with [`LabError::AlreadyExists`] if the directory is
    /// already there. `Resume` reads the persisted config back and fails
    /// with [`LabError::NotFound`] if it is not.
    pub fn open(&self, name: &str, mode: OpenMode) -> Result<Experiment> {
        match mode {
            OpenMode::Create => self.create(name),
            OpenMode::Resume => self.resume(name),
        }
    }

    /// Create an experiment whose hyperparameters derive from its name.
    pub fn create(&self, name: &str) -> Result<Experiment> {
        let key = parse_experiment_name(name)?;
        let profile = key.profile;
        let params = key.into_params()?;
        self.create_record(name.to_string(), profile, params)
    }

    /// Create an experiment from an explicit hyperparameter set, deriving
    /// its name from the set.
    pub fn create_with(&self, profile: TaskProfile, params: HyperparamSet) -> Result<Experiment> {
        params.validate()?;
        let name = experiment_name(profile, &params);
        self.create_record(name, profile, params)
    }

    fn create_record(
        &self,
        name: String,
        profile: TaskProfile,
        params: HyperparamSet,
    ) -> Result<Experiment> {
        fs::create_dir_all(&self.root)?;
        let paths = self.paths(&name);
        // create_dir claims the name atomically; a racing create loses here.
        if let Err(e) = fs::create_dir(&paths.root) {
            if e.kind() == ErrorKind::AlreadyExists {
                return Err(LabError::AlreadyExists(name));
            }
            return Err(e.into());
        }
        let config = ExperimentConfig {
            name: name.clone(),
            profile,
            params,
            artifacts: ArtifactPaths::defaults_in(&self.data_dir),
            created_at: Utc::now(),
        };
        let experiment = self.initialize(paths, config)?;
        info!(name = %name, profile = %profile, "created experiment");
        Ok(experiment)
    }

    /// Populate a freshly claimed experiment directory.
    ///
    /// A failed create must leave the name free for a retry, so any error
    /// here removes the claimed directory before propagating.
    fn initialize(&self, paths: ExperimentPaths, config: ExperimentConfig) -> Result<Experiment> {
        let populated = (|| {
            fs::create_dir(&paths.checkpoint_dir)?;
            fs::create_dir(&paths.log_dir)?;
            persistence::atomic_write_json(&paths.config_file, &config)
        })();
        if let Err(e) = populated {
            let _ = fs::remove_dir_all(&paths.root);
            return Err(e);
        }
        Ok(Experiment { config, paths })
    }

    /// Resume an existing experiment.
    pub fn resume(&self, name: &str) -> Result<Experiment> {
        check_name(name)?;
        let paths = self.paths(name);
        if !paths.root.is_dir() {
            return Err(LabError::NotFound(name.to_string()));
        }
        let config: ExperimentConfig = persistence::load_json(&paths.config_file)?
            .ok_or_else(|| {
                LabError::config(format!("experiment '{name}' has no {CONFIG_FILE}"))
            })?;
        config.params.validate()?;
        debug!(name = %name, "resumed experiment");
        Ok(Experiment { config, paths })
    }

    /// Delete an experiment directory and everything under it.
    ///
    /// Idempotent: deleting an absent name is not an error. Returns whether
    /// anything was removed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        let paths = self.paths(name);
        if !paths.root.exists() {
            debug!(name = %name, "delete skipped, experiment absent");
            return Ok(false);
        }
        fs::remove_dir_all(&paths.root)?;
        info!(name = %name, "deleted experiment");
        Ok(true)
    }

    /// Names of all experiments under the root, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Disk-level overview of one experiment.
    pub fn summary(&self, name: &str) -> Result<ExperimentSummary> {
        let experiment = self.resume(name)?;
        let manifest = experiment
            .paths
            .checkpoint_dir
            .join(checkpoint::MANIFEST_FILE);
        let checkpoints: Vec<Checkpoint> = persistence::load_json(&manifest)?.unwrap_or_default();
        Ok(ExperimentSummary {
            name: experiment.config.name,
            profile: experiment.config.profile,
            created_at: experiment.config.created_at,
            num_checkpoints: checkpoints.len(),
            disk_bytes: persistence::dir_size_bytes(&experiment.paths.root),
        })
    }
}

/// Reject names that could escape the registry root.
///
/// Creation already restricts names through the codec; this guards resume
/// and delete, which accept arbitrary strings.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LabError::invalid_name("name must not be empty"));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(LabError::invalid_name(format!(
            "'{name}' is not a plain directory name"
        )));
    }
    Ok(())
}
