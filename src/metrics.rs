//! Discrimination and calibration metrics

use crate::error::{PipelineError, Result};
use ndarray::Array1;

/// Area under the ROC curve via the rank-sum (Mann-Whitney) statistic.
///
/// Ties in the predicted probabilities receive their average rank, so
/// constant predictions score exactly 0.5. Requires at least one positive
/// and one negative label.
pub fn roc_auc(probs: &Array1<f64>, labels: &Array1<f64>) -> Result<f64> {
    if probs.len() != labels.len() {
        return Err(PipelineError::Shape {
            expected: format!("labels length = {}", probs.len()),
            actual: format!("labels length = {}", labels.len()),
        });
    }

    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PipelineError::DataInsufficiency(format!(
            "AUC undefined: {} positive and {} negative labels",
            n_pos, n_neg
        )));
    }

    // Sort indices by predicted probability
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| {
        probs[a]
            .partial_cmp(&probs[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Assign average ranks to tied groups, accumulating the positive rank sum
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; every index in [i, j] gets the group's mean rank
        let avg_rank = ((i + 1 + j + 1) as f64) / 2.0;
        for &idx in &order[i..=j] {
            if labels[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    let n_neg_f = n_neg as f64;
    Ok((rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg_f))
}

/// Brier score: mean squared difference between predicted probability and
/// the observed binary outcome. Lower is better.
pub fn brier_score(probs: &Array1<f64>, labels: &Array1<f64>) -> Result<f64> {
    if probs.len() != labels.len() {
        return Err(PipelineError::Shape {
            expected: format!("labels length = {}", probs.len()),
            actual: format!("labels length = {}", labels.len()),
        });
    }
    if probs.is_empty() {
        return Err(PipelineError::DataInsufficiency(
            "Brier score undefined on empty input".to_string(),
        ));
    }

    let n = probs.len() as f64;
    let score: f64 = probs
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| (p - y).powi(2))
        .sum();

    Ok(score / n)
}

/// Fraction of positive labels
pub fn prevalence(labels: &Array1<f64>) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&y| y > 0.5).count() as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_auc_perfect_ranking() {
        let probs = array![0.1, 0.2, 0.8, 0.9];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc(&probs, &labels).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_inverted_ranking() {
        let probs = array![0.9, 0.8, 0.2, 0.1];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc(&probs, &labels).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn test_auc_constant_predictions() {
        let probs = array![0.5, 0.5, 0.5, 0.5];
        let labels = array![0.0, 1.0, 0.0, 1.0];
        let auc = roc_auc(&probs, &labels).unwrap();
        assert!((auc - 0.5).abs() < 1e-12, "tied ranks should give 0.5, got {}", auc);
    }

    #[test]
    fn test_auc_single_class_is_error() {
        let probs = array![0.1, 0.2, 0.3];
        let labels = array![0.0, 0.0, 0.0];
        assert!(matches!(
            roc_auc(&probs, &labels),
            Err(PipelineError::DataInsufficiency(_))
        ));
    }

    #[test]
    fn test_brier_score_bounds() {
        let probs = array![1.0, 0.0, 1.0, 0.0];
        let labels = array![1.0, 0.0, 1.0, 0.0];
        assert!(brier_score(&probs, &labels).unwrap() < 1e-12);

        let probs = array![0.0, 1.0];
        let labels = array![1.0, 0.0];
        assert!((brier_score(&probs, &labels).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_prevalence() {
        let labels = array![1.0, 0.0, 0.0, 0.0, 1.0];
        assert!((prevalence(&labels) - 0.4).abs() < 1e-12);
    }
}
