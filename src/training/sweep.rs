//! Hyperparameter sweeps over the name-keyed parameters.
//!
//! A sweep expands into concrete hyperparameter sets, one experiment per
//! set. Because names derive from the swept parameters, a sweep can later
//! be deleted by regenerating the same names.

use crate::error::{LabError, Result};
use crate::params::{HyperparamSet, TaskProfile, experiment_name};
use crate::registry::{Experiment, ExperimentRegistry};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Sweep strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SweepStrategy {
    Grid(ParamGrid),
    Random(RandomSearch),
}

/// Cartesian product over learning rates and vocabulary caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub learning_rates: Vec<f64>,
    pub max_vocab_sizes: Vec<usize>,
}

/// Random search: log-uniform learning rate, vocabulary cap drawn from a
/// fixed set of choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSearch {
    pub trials: usize,
    pub lr_min: f64,
    pub lr_max: f64,
    pub max_vocab_sizes: Vec<usize>,
}

impl ParamGrid {
    /// Expand the grid into hyperparameter sets, learning rate varying
    /// slowest.
    pub fn param_sets(&self, profile: TaskProfile) -> Vec<HyperparamSet> {
        let mut sets = Vec::with_capacity(self.learning_rates.len() * self.max_vocab_sizes.len());
        for &lr in &self.learning_rates {
            for &cap in &self.max_vocab_sizes {
                sets.push(
                    HyperparamSet::defaults(profile)
                        .with_learning_rate(lr)
                        .with_max_vocab_size(cap),
                );
            }
        }
        sets
    }

    /// The experiment names this grid expands to.
    pub fn names(&self, profile: TaskProfile) -> Vec<String> {
        self.param_sets(profile)
            .iter()
            .map(|params| experiment_name(profile, params))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.learning_rates.len() * self.max_vocab_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RandomSearch {
    /// Draw `trials` hyperparameter sets using `rng`.
    pub fn param_sets<R: Rng>(
        &self,
        profile: TaskProfile,
        rng: &mut R,
    ) -> Result<Vec<HyperparamSet>> {
        if self.trials == 0 {
            return Err(LabError::config("random search needs at least one trial"));
        }
        if !(self.lr_min.is_finite() && self.lr_max.is_finite())
            || self.lr_min <= 0.0
            || self.lr_min > self.lr_max
        {
            return Err(LabError::config(format!(
                "learning rate range [{}, {}] is not usable",
                self.lr_min, self.lr_max,
            )));
        }
        if self.max_vocab_sizes.is_empty() {
            return Err(LabError::config("random search needs vocab cap choices"));
        }

        let sets = (0..self.trials)
            .map(|_| {
                let lr = rng.gen_range(self.lr_min.ln()..=self.lr_max.ln()).exp();
                let cap = self.max_vocab_sizes[rng.gen_range(0..self.max_vocab_sizes.len())];
                HyperparamSet::defaults(profile)
                    .with_learning_rate(lr)
                    .with_max_vocab_size(cap)
            })
            .collect();
        Ok(sets)
    }
}

impl SweepStrategy {
    /// Expand the strategy into concrete hyperparameter sets.
    pub fn param_sets<R: Rng>(
        &self,
        profile: TaskProfile,
        rng: &mut R,
    ) -> Result<Vec<HyperparamSet>> {
        match self {
            Self::Grid(grid) => Ok(grid.param_sets(profile)),
            Self::Random(search) => search.param_sets(profile, rng),
        }
    }
}

/// Create one experiment per hyperparameter set.
///
/// Fails fast on the first error, including [`LabError::AlreadyExists`]
/// for names left over from earlier sweeps; delete those first.
pub fn create_all(
    registry: &ExperimentRegistry,
    profile: TaskProfile,
    sets: &[HyperparamSet],
) -> Result<Vec<Experiment>> {
    let mut experiments = Vec::with_capacity(sets.len());
    for params in sets {
        experiments.push(registry.create_with(profile, params.clone())?);
    }
    info!(created = experiments.len(), profile = %profile, "sweep experiments created");
    Ok(experiments)
}

/// Delete every experiment a grid expands to.
///
/// Idempotent like single deletion; returns the number actually removed.
pub fn delete_all(
    registry: &ExperimentRegistry,
    profile: TaskProfile,
    grid: &ParamGrid,
) -> Result<usize> {
    let mut removed = 0;
    for name in grid.names(profile) {
        if registry.delete(&name)? {
            removed += 1;
        }
    }
    info!(removed, profile = %profile, "sweep experiments deleted");
    Ok(removed)
}
