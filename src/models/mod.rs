//! Model family registry
//!
//! The five classifier families are a closed set: each variant carries its
//! own hyperparameter space type, so adding or removing a family is a
//! compile-time change rather than reflective dispatch. Registry order is
//! load-bearing: it is the deterministic tie-break order for best-model
//! selection.

pub mod decision_tree;
pub mod gradient_boosting;
pub mod logistic;
pub mod mlp;
pub mod random_forest;
pub mod svm;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GbdtConfig, GbdtGrid, GradientBoostedTrees};
pub use logistic::{LogisticConfig, LogisticGrid, LogisticRegression};
pub use mlp::{MlpClassifier, MlpConfig, MlpGrid};
pub use random_forest::{ForestConfig, ForestGrid, RandomForestClassifier};
pub use svm::{Kernel, SvcClassifier, SvcConfig, SvcGrid};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// The five classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    GradientBoosting,
    RandomForest,
    SupportVector,
    NeuralNet,
    Logistic,
}

impl ModelFamily {
    /// Registry order; ties on score resolve to the earlier entry
    pub const REGISTRY: [ModelFamily; 5] = [
        ModelFamily::GradientBoosting,
        ModelFamily::RandomForest,
        ModelFamily::SupportVector,
        ModelFamily::NeuralNet,
        ModelFamily::Logistic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::SupportVector => "support_vector",
            ModelFamily::NeuralNet => "neural_net",
            ModelFamily::Logistic => "logistic",
        }
    }

    /// SVC and MLP train on standardized features; the tree ensembles and
    /// logistic regression consume the unscaled matrix.
    pub fn needs_scaling(&self) -> bool {
        matches!(self, ModelFamily::SupportVector | ModelFamily::NeuralNet)
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One hyperparameter combination, tagged by family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FamilyParams {
    GradientBoosting(GbdtConfig),
    RandomForest(ForestConfig),
    SupportVector(SvcConfig),
    NeuralNet(MlpConfig),
    Logistic(LogisticConfig),
}

impl FamilyParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            FamilyParams::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FamilyParams::RandomForest(_) => ModelFamily::RandomForest,
            FamilyParams::SupportVector(_) => ModelFamily::SupportVector,
            FamilyParams::NeuralNet(_) => ModelFamily::NeuralNet,
            FamilyParams::Logistic(_) => ModelFamily::Logistic,
        }
    }
}

impl std::fmt::Display for FamilyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FamilyParams::GradientBoosting(c) => write!(
                f,
                "trees={} lr={} depth={}",
                c.n_estimators, c.learning_rate, c.max_depth
            ),
            FamilyParams::RandomForest(c) => write!(
                f,
                "trees={} depth={} min_leaf={}",
                c.n_estimators,
                c.max_depth.map_or("none".to_string(), |d| d.to_string()),
                c.min_samples_leaf
            ),
            FamilyParams::SupportVector(c) => write!(f, "C={} kernel={}", c.c, c.kernel),
            FamilyParams::NeuralNet(c) => write!(
                f,
                "hidden={:?} alpha={} lr={}",
                c.hidden_layers, c.alpha, c.learning_rate
            ),
            FamilyParams::Logistic(c) => write!(f, "alpha={}", c.alpha),
        }
    }
}

/// One family's hyperparameter search space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FamilyGrid {
    GradientBoosting(GbdtGrid),
    RandomForest(ForestGrid),
    SupportVector(SvcGrid),
    NeuralNet(MlpGrid),
    Logistic(LogisticGrid),
}

impl FamilyGrid {
    pub fn family(&self) -> ModelFamily {
        match self {
            FamilyGrid::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FamilyGrid::RandomForest(_) => ModelFamily::RandomForest,
            FamilyGrid::SupportVector(_) => ModelFamily::SupportVector,
            FamilyGrid::NeuralNet(_) => ModelFamily::NeuralNet,
            FamilyGrid::Logistic(_) => ModelFamily::Logistic,
        }
    }

    /// Enumerate the cross-product of this family's candidate sets
    pub fn candidates(&self) -> Vec<FamilyParams> {
        match self {
            FamilyGrid::GradientBoosting(g) => g
                .candidates()
                .into_iter()
                .map(FamilyParams::GradientBoosting)
                .collect(),
            FamilyGrid::RandomForest(g) => g
                .candidates()
                .into_iter()
                .map(FamilyParams::RandomForest)
                .collect(),
            FamilyGrid::SupportVector(g) => g
                .candidates()
                .into_iter()
                .map(FamilyParams::SupportVector)
                .collect(),
            FamilyGrid::NeuralNet(g) => g
                .candidates()
                .into_iter()
                .map(FamilyParams::NeuralNet)
                .collect(),
            FamilyGrid::Logistic(g) => g
                .candidates()
                .into_iter()
                .map(FamilyParams::Logistic)
                .collect(),
        }
    }
}

/// Default search spaces, in registry order
pub fn default_grids() -> Vec<FamilyGrid> {
    vec![
        FamilyGrid::GradientBoosting(GbdtGrid::default()),
        FamilyGrid::RandomForest(ForestGrid::default()),
        FamilyGrid::SupportVector(SvcGrid::default()),
        FamilyGrid::NeuralNet(MlpGrid::default()),
        FamilyGrid::Logistic(LogisticGrid::default()),
    ]
}

/// A fitted classifier from any family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    GradientBoosting(GradientBoostedTrees),
    RandomForest(RandomForestClassifier),
    SupportVector(SvcClassifier),
    NeuralNet(MlpClassifier),
    Logistic(LogisticRegression),
}

impl TrainedClassifier {
    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedClassifier::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedClassifier::RandomForest(_) => ModelFamily::RandomForest,
            TrainedClassifier::SupportVector(_) => ModelFamily::SupportVector,
            TrainedClassifier::NeuralNet(_) => ModelFamily::NeuralNet,
            TrainedClassifier::Logistic(_) => ModelFamily::Logistic,
        }
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedClassifier::GradientBoosting(m) => m.predict_proba(x),
            TrainedClassifier::RandomForest(m) => m.predict_proba(x),
            TrainedClassifier::SupportVector(m) => m.predict_proba(x),
            TrainedClassifier::NeuralNet(m) => m.predict_proba(x),
            TrainedClassifier::Logistic(m) => m.predict_proba(x),
        }
    }
}

/// Fit one hyperparameter combination, overriding its seed with the run
/// seed so every candidate in a search shares the same random stream base.
pub fn fit_params(
    params: &FamilyParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    seed: u64,
) -> Result<TrainedClassifier> {
    match params {
        FamilyParams::GradientBoosting(config) => {
            let mut config = config.clone();
            config.seed = Some(seed);
            let mut model = GradientBoostedTrees::new(config);
            model.fit(x, y)?;
            Ok(TrainedClassifier::GradientBoosting(model))
        }
        FamilyParams::RandomForest(config) => {
            let mut config = config.clone();
            config.seed = Some(seed);
            let mut model = RandomForestClassifier::new(config);
            model.fit(x, y)?;
            Ok(TrainedClassifier::RandomForest(model))
        }
        FamilyParams::SupportVector(config) => {
            let mut config = config.clone();
            config.seed = Some(seed);
            let mut model = SvcClassifier::new(config);
            model.fit(x, y)?;
            Ok(TrainedClassifier::SupportVector(model))
        }
        FamilyParams::NeuralNet(config) => {
            let mut config = config.clone();
            config.seed = Some(seed);
            let mut model = MlpClassifier::new(config);
            model.fit(x, y)?;
            Ok(TrainedClassifier::NeuralNet(model))
        }
        FamilyParams::Logistic(config) => {
            let mut model = LogisticRegression::new(config.clone());
            model.fit(x, y)?;
            Ok(TrainedClassifier::Logistic(model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_five_families() {
        assert_eq!(ModelFamily::REGISTRY.len(), 5);
        assert_eq!(ModelFamily::REGISTRY[4], ModelFamily::Logistic);
    }

    #[test]
    fn test_default_grids_match_registry_order() {
        let grids = default_grids();
        assert_eq!(grids.len(), ModelFamily::REGISTRY.len());
        for (grid, family) in grids.iter().zip(ModelFamily::REGISTRY.iter()) {
            assert_eq!(grid.family(), *family);
        }
    }

    #[test]
    fn test_every_grid_is_nonempty() {
        for grid in default_grids() {
            assert!(
                !grid.candidates().is_empty(),
                "{} grid has no candidates",
                grid.family()
            );
        }
    }

    #[test]
    fn test_scaling_split() {
        assert!(ModelFamily::SupportVector.needs_scaling());
        assert!(ModelFamily::NeuralNet.needs_scaling());
        assert!(!ModelFamily::GradientBoosting.needs_scaling());
        assert!(!ModelFamily::RandomForest.needs_scaling());
        assert!(!ModelFamily::Logistic.needs_scaling());
    }

    #[test]
    fn test_params_display_is_compact() {
        let params = FamilyParams::GradientBoosting(GbdtConfig::default());
        let text = params.to_string();
        assert!(text.contains("trees=") && text.contains("depth="));
    }

    #[test]
    fn test_fit_params_trains_each_family() {
        let x = ndarray::Array2::from_shape_fn((40, 2), |(i, j)| {
            if i < 20 { -1.0 - (i + j) as f64 * 0.01 } else { 1.0 + (i + j) as f64 * 0.01 }
        });
        let y = ndarray::Array1::from_shape_fn(40, |i| if i < 20 { 0.0 } else { 1.0 });

        for grid in default_grids() {
            let params = &grid.candidates()[0];
            let model = fit_params(params, &x, &y, 42)
                .unwrap_or_else(|e| panic!("{} failed: {}", grid.family(), e));
            assert_eq!(model.family(), grid.family());
            let probs = model.predict_proba(&x).unwrap();
            assert_eq!(probs.len(), 40);
        }
    }
}
