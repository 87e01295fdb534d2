//! Gradient-boosted trees for binary outcomes
//!
//! Logistic-loss boosting: regression trees are fitted to the gradient of
//! the log loss on the current log-odds, scaled by a shrinkage factor.
//! Row subsampling per round adds stochasticity under a fixed seed.

use crate::error::{PipelineError, Result};
use crate::models::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample fraction per round
    pub subsample: f64,
    /// Random seed
    pub seed: Option<u64>,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            seed: Some(42),
        }
    }
}

/// Hyperparameter candidate sets for gradient boosting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
}

impl Default for GbdtGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            learning_rate: vec![0.05, 0.1],
            max_depth: vec![2, 3],
        }
    }
}

impl GbdtGrid {
    /// Cross-product of the candidate sets
    pub fn candidates(&self) -> Vec<GbdtConfig> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &learning_rate in &self.learning_rate {
                for &max_depth in &self.max_depth {
                    out.push(GbdtConfig {
                        n_estimators,
                        learning_rate,
                        max_depth,
                        ..Default::default()
                    });
                }
            }
        }
        out
    }
}

/// Fitted gradient-boosted classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    config: GbdtConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
}

impl GradientBoostedTrees {
    pub fn new(config: GbdtConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
        }
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let p = y.mean().unwrap_or(0.5);
        if p <= 0.0 || p >= 1.0 {
            return Err(PipelineError::Training(
                "boosting requires both classes in the training target".to_string(),
            ));
        }
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        self.trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            // Gradient of the log loss on current predictions
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - 1.0 / (1.0 + (-lo).exp()))
                .collect();

            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let r_sub: Array1<f64> =
                Array1::from_iter(sample_indices.iter().map(|&i| residuals[i]));

            let mut tree = DecisionTree::new(Criterion::Variance)
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            let contribution = tree.predict(x)?;
            for i in 0..n_samples {
                log_odds[i] += self.config.learning_rate * contribution[i];
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    fn subsample_indices(&self, n_samples: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let take = ((n_samples as f64) * self.config.subsample).ceil() as usize;
        let take = take.clamp(1, n_samples);
        if take == n_samples {
            return (0..n_samples).collect();
        }
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(rng);
        indices.truncate(take);
        indices.sort_unstable();
        indices
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            let pred = tree.predict(x)?;
            for i in 0..x.nrows() {
                log_odds[i] += self.config.learning_rate * pred[i];
            }
        }

        Ok(log_odds.mapv(|lo| 1.0 / (1.0 + (-lo).exp())))
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }
}
