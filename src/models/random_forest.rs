//! Random forest for binary outcomes
//!
//! Bootstrap-bagged Gini trees, each grown on a random feature subset.
//! Trees are built in parallel with per-tree seeds derived from the base
//! seed, so the fitted forest is identical regardless of thread count.
//! The predicted probability is the mean of the trees' leaf fractions.

use crate::error::{PipelineError, Result};
use crate::models::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree; `None` grows to purity
    pub max_depth: Option<usize>,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Random seed
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            seed: Some(42),
        }
    }
}

/// Hyperparameter candidate sets for the forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![Some(5), Some(10), None],
            min_samples_leaf: vec![1, 5],
        }
    }
}

impl ForestGrid {
    pub fn candidates(&self) -> Vec<ForestConfig> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_leaf in &self.min_samples_leaf {
                    out.push(ForestConfig {
                        n_estimators,
                        max_depth,
                        min_samples_leaf,
                        ..Default::default()
                    });
                }
            }
        }
        out
    }
}

/// Fitted random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: ForestConfig,
    /// Each tree together with the feature indices it was grown on
    trees: Vec<(DecisionTree, Vec<usize>)>,
}

impl RandomForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < 2 {
            return Err(PipelineError::Training(
                "forest needs at least 2 training rows".to_string(),
            ));
        }

        let n_subset = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
        let base_seed = self.config.seed.unwrap_or(42);

        self.trees = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                // Bootstrap rows
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                // Random feature subset, kept sorted so column selection is stable
                let mut feature_indices: Vec<usize> = (0..n_features).collect();
                feature_indices.shuffle(&mut rng);
                feature_indices.truncate(n_subset);
                feature_indices.sort_unstable();

                let x_boot = x
                    .select(Axis(0), &sample_indices)
                    .select(Axis(1), &feature_indices);
                let y_boot: Array1<f64> =
                    Array1::from_iter(sample_indices.iter().map(|&i| y[i]));

                let mut tree = DecisionTree::new(Criterion::Gini)
                    .with_min_samples_leaf(self.config.min_samples_leaf);
                if let Some(depth) = self.config.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(&x_boot, &y_boot)?;

                Ok((tree, feature_indices))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }

    /// Positive-class probability: mean leaf fraction across trees
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted);
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|(tree, feature_indices)| {
                let x_sub = x.select(Axis(1), feature_indices);
                tree.predict(&x_sub)
            })
            .collect::<Result<Vec<_>>>()?;

        let n_trees = per_tree.len() as f64;
        Ok(Array1::from_iter((0..x.nrows()).map(|i| {
            per_tree.iter().map(|p| p[i]).sum::<f64>() / n_trees
        })))
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cluster_data() -> (Array2<f64>, Array1<f64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            data.extend([(i % 4) as f64 * 0.1, (i % 3) as f64 * 0.1]);
            labels.push(0.0);
        }
        for i in 0..15 {
            data.extend([5.0 + (i % 4) as f64 * 0.1, 5.0 + (i % 3) as f64 * 0.1]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((30, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_separates_clusters() {
        let (x, y) = cluster_data();
        let mut forest = RandomForestClassifier::new(ForestConfig {
            n_estimators: 30,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();

        let probs = forest.predict_proba(&x).unwrap();
        let auc = crate::metrics::roc_auc(&probs, &y).unwrap();
        assert!(auc > 0.95, "AUC was {}", auc);
    }

    #[test]
    fn test_probabilities_bounded() {
        let (x, y) = cluster_data();
        let mut forest = RandomForestClassifier::new(ForestConfig::default());
        forest.fit(&x, &y).unwrap();

        let probs = forest.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let (x, y) = cluster_data();
        let config = ForestConfig {
            n_estimators: 20,
            seed: Some(11),
            ..Default::default()
        };

        let mut a = RandomForestClassifier::new(config.clone());
        a.fit(&x, &y).unwrap();
        let mut b = RandomForestClassifier::new(config);
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted_errors() {
        let forest = RandomForestClassifier::new(ForestConfig::default());
        assert!(forest.predict_proba(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_grid_cross_product() {
        let grid = ForestGrid::default();
        assert_eq!(
            grid.candidates().len(),
            grid.n_estimators.len() * grid.max_depth.len() * grid.min_samples_leaf.len()
        );
    }
}
