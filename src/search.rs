//! Cross-validated hyperparameter search
//!
//! Exhaustive grid search over one family's candidate cross-product.
//! Every candidate is scored by stratified k-fold ROC AUC on the training
//! partition; candidates are evaluated in parallel and reduced by a
//! deterministic arg-max (first candidate wins ties), so the outcome is
//! independent of thread scheduling. The winner is refitted on the full
//! training partition.

use crate::error::{PipelineError, Result};
use crate::metrics::roc_auc;
use crate::models::{fit_params, FamilyGrid, FamilyParams, TrainedClassifier};
use crate::split::stratified_k_fold;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Search settings shared by all families in an outcome run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Cross-validation fold count
    pub cv_folds: usize,
    /// Seed for fold assignment, candidate subsampling and model fits
    pub seed: u64,
    /// Optional cap on evaluated candidates (seeded subsample). Bounds
    /// grid-search work on large cohorts; `None` is exhaustive.
    pub max_candidates: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            seed: 42,
            max_candidates: None,
        }
    }
}

/// Winning candidate for one family
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub params: FamilyParams,
    /// Per-fold AUC of the winning candidate
    pub cv_scores: Vec<f64>,
    pub mean_cv_auc: f64,
    /// Winner refitted on the full training partition
    pub model: TrainedClassifier,
    /// Candidates actually evaluated
    pub n_candidates: usize,
}

struct FoldData {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_val: Array2<f64>,
    y_val: Array1<f64>,
}

/// Run the search for one family on (balanced, possibly scaled) training data
pub fn grid_search(
    grid: &FamilyGrid,
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &SearchConfig,
) -> Result<SearchOutcome> {
    let family = grid.family();
    let mut candidates = grid.candidates();
    if candidates.is_empty() {
        return Err(PipelineError::Config(format!(
            "{} grid has no candidates",
            family
        )));
    }

    if let Some(cap) = config.max_candidates {
        if cap < candidates.len() {
            info!(
                family = %family,
                total = candidates.len(),
                evaluated = cap,
                "candidate budget caps the grid; dropping a seeded subset"
            );
            let mut order: Vec<usize> = (0..candidates.len()).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            order.shuffle(&mut rng);
            order.truncate(cap.max(1));
            // Preserve grid order among survivors so tie-breaks stay stable
            order.sort_unstable();
            candidates = order.into_iter().map(|i| candidates[i].clone()).collect();
        }
    }

    let folds: Vec<FoldData> = stratified_k_fold(y, config.cv_folds, config.seed)?
        .into_iter()
        .map(|p| FoldData {
            x_train: x.select(Axis(0), &p.train),
            y_train: Array1::from_iter(p.train.iter().map(|&i| y[i])),
            x_val: x.select(Axis(0), &p.test),
            y_val: Array1::from_iter(p.test.iter().map(|&i| y[i])),
        })
        .collect();

    // Score all candidates; each entry is Ok(per-fold scores) or the first
    // hard failure encountered for that candidate.
    let scored: Vec<std::result::Result<Vec<f64>, PipelineError>> = candidates
        .par_iter()
        .map(|params| score_candidate(params, &folds, config.seed))
        .collect();

    let mut winner: Option<(usize, f64, Vec<f64>)> = None;
    let mut last_failure: Option<String> = None;
    for (idx, result) in scored.into_iter().enumerate() {
        match result {
            Ok(scores) => {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                // Strictly-greater: the first candidate keeps ties
                if winner.as_ref().map_or(true, |(_, best, _)| mean > *best) {
                    winner = Some((idx, mean, scores));
                }
            }
            Err(e) => {
                debug!(family = %family, candidate = %candidates[idx], error = %e,
                    "candidate excluded from search");
                last_failure = Some(e.to_string());
            }
        }
    }

    let (best_idx, mean_cv_auc, cv_scores) = winner.ok_or_else(|| {
        PipelineError::Training(format!(
            "all {} {} candidates failed cross-validation{}",
            candidates.len(),
            family,
            last_failure.map_or(String::new(), |e| format!(" (last: {})", e))
        ))
    })?;

    let params = candidates[best_idx].clone();
    let model = fit_params(&params, x, y, config.seed)?;

    Ok(SearchOutcome {
        n_candidates: candidates.len(),
        params,
        cv_scores,
        mean_cv_auc,
        model,
    })
}

/// Per-fold AUC for one candidate.
///
/// A fold whose validation slice cannot support an AUC (degenerate class
/// mix) is skipped; a fold where fitting itself errors fails the whole
/// candidate. A candidate with no scoreable folds also fails.
fn score_candidate(
    params: &FamilyParams,
    folds: &[FoldData],
    seed: u64,
) -> std::result::Result<Vec<f64>, PipelineError> {
    let mut scores = Vec::with_capacity(folds.len());

    for fold in folds {
        let model = fit_params(params, &fold.x_train, &fold.y_train, seed)?;
        let probs = model.predict_proba(&fold.x_val)?;
        match roc_auc(&probs, &fold.y_val) {
            Ok(auc) => scores.push(auc),
            Err(PipelineError::DataInsufficiency(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    if scores.is_empty() {
        return Err(PipelineError::DataInsufficiency(
            "no fold produced a defined AUC".to_string(),
        ));
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FamilyGrid, LogisticGrid, ModelFamily};

    fn separable_data(n_per_class: usize) -> (Array2<f64>, Array1<f64>) {
        let n = n_per_class * 2;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let side = if i < n_per_class { -1.0 } else { 1.0 };
            side * (1.0 + ((i * 7 + j * 3) % 5) as f64 * 0.1)
        });
        let y = Array1::from_shape_fn(n, |i| if i < n_per_class { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_search_selects_and_refits() {
        let (x, y) = separable_data(30);
        let grid = FamilyGrid::Logistic(LogisticGrid::default());

        let outcome = grid_search(&grid, &x, &y, &SearchConfig::default()).unwrap();
        assert_eq!(outcome.model.family(), ModelFamily::Logistic);
        assert!(outcome.mean_cv_auc > 0.9, "CV AUC {}", outcome.mean_cv_auc);
        assert!(!outcome.cv_scores.is_empty());
        assert_eq!(outcome.n_candidates, LogisticGrid::default().alpha.len());
    }

    #[test]
    fn test_search_is_deterministic() {
        let (x, y) = separable_data(25);
        let grid = FamilyGrid::Logistic(LogisticGrid::default());
        let config = SearchConfig {
            seed: 9,
            ..Default::default()
        };

        let a = grid_search(&grid, &x, &y, &config).unwrap();
        let b = grid_search(&grid, &x, &y, &config).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.mean_cv_auc, b.mean_cv_auc);
        assert_eq!(a.cv_scores, b.cv_scores);
    }

    #[test]
    fn test_candidate_budget_caps_work() {
        let (x, y) = separable_data(25);
        let grid = FamilyGrid::Logistic(LogisticGrid {
            alpha: vec![1e-4, 1e-3, 1e-2, 1e-1, 1.0],
        });
        let config = SearchConfig {
            max_candidates: Some(2),
            ..Default::default()
        };

        let outcome = grid_search(&grid, &x, &y, &config).unwrap();
        assert_eq!(outcome.n_candidates, 2);
    }

    #[test]
    fn test_single_class_training_data_errors() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i + j) as f64);
        let y = Array1::zeros(20);
        let grid = FamilyGrid::Logistic(LogisticGrid::default());

        assert!(matches!(
            grid_search(&grid, &x, &y, &SearchConfig::default()),
            Err(PipelineError::DataInsufficiency(_))
        ));
    }

    #[test]
    fn test_tie_break_keeps_first_candidate() {
        let (x, y) = separable_data(25);
        // Identical candidates force an exact tie; the first must win
        let grid = FamilyGrid::Logistic(LogisticGrid {
            alpha: vec![0.01, 0.01, 0.01],
        });

        let outcome = grid_search(&grid, &x, &y, &SearchConfig::default()).unwrap();
        match outcome.params {
            FamilyParams::Logistic(c) => assert_eq!(c.alpha, 0.01),
            _ => panic!("wrong family"),
        }
    }
}
