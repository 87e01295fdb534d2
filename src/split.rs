//! Stratified partitioning
//!
//! Binary-outcome splits that preserve class prevalence. Index lists are
//! built per class in a fixed order (negatives, then positives) and
//! shuffled with a seeded ChaCha8 stream, so every split is deterministic
//! for a given seed regardless of thread count or platform.

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Index sets for one train/test partition
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn class_index_lists(y: &Array1<f64>) -> (Vec<usize>, Vec<usize>) {
    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for (i, &v) in y.iter().enumerate() {
        if v > 0.5 {
            positives.push(i);
        } else {
            negatives.push(i);
        }
    }
    (negatives, positives)
}

/// Stratified holdout split.
///
/// Each class contributes `test_fraction` of its members (at least one,
/// never all) to the test partition. Requires at least two members of each
/// class; anything less makes stratification undefined and is reported as
/// a data-insufficiency error rather than silently degrading.
pub fn stratified_split(y: &Array1<f64>, test_fraction: f64, seed: u64) -> Result<Partition> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(PipelineError::Config(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let (negatives, positives) = class_index_lists(y);
    if positives.len() < 2 || negatives.len() < 2 {
        return Err(PipelineError::DataInsufficiency(format!(
            "stratified split needs >=2 of each class, got {} positive / {} negative",
            positives.len(),
            negatives.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut partition = Partition {
        train: Vec::with_capacity(y.len()),
        test: Vec::with_capacity((y.len() as f64 * test_fraction) as usize + 2),
    };

    for indices in [&negatives, &positives] {
        let mut shuffled = indices.clone();
        shuffled.shuffle(&mut rng);

        let test_size = ((shuffled.len() as f64) * test_fraction).round() as usize;
        let test_size = test_size.clamp(1, shuffled.len() - 1);

        partition.test.extend_from_slice(&shuffled[..test_size]);
        partition.train.extend_from_slice(&shuffled[test_size..]);
    }

    Ok(partition)
}

/// Stratified k-fold splits for cross-validation.
///
/// Class indices are shuffled once, then dealt round-robin into folds so
/// every fold carries close to the cohort prevalence. Folds are disjoint
/// and exhaustive.
pub fn stratified_k_fold(y: &Array1<f64>, n_splits: usize, seed: u64) -> Result<Vec<Partition>> {
    if n_splits < 2 {
        return Err(PipelineError::Config(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }

    let (negatives, positives) = class_index_lists(y);
    if positives.len() < n_splits || negatives.len() < n_splits {
        return Err(PipelineError::DataInsufficiency(format!(
            "{}-fold stratification needs >={} of each class, got {} positive / {} negative",
            n_splits, n_splits, positives.len(), negatives.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];

    for indices in [&negatives, &positives] {
        let mut shuffled = indices.clone();
        shuffled.shuffle(&mut rng);
        for (i, idx) in shuffled.into_iter().enumerate() {
            folds[i % n_splits].push(idx);
        }
    }

    Ok((0..n_splits)
        .map(|fold_idx| Partition {
            test: folds[fold_idx].clone(),
            train: folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::prevalence;

    fn labels(n_pos: usize, n_neg: usize) -> Array1<f64> {
        let mut v = vec![1.0; n_pos];
        v.extend(vec![0.0; n_neg]);
        Array1::from_vec(v)
    }

    #[test]
    fn test_split_disjoint_and_exhaustive() {
        let y = labels(30, 270);
        let p = stratified_split(&y, 0.3, 7).unwrap();

        assert_eq!(p.train.len() + p.test.len(), 300);
        let mut all: Vec<usize> = p.train.iter().chain(p.test.iter()).copied().collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 300, "partitions must not overlap");
    }

    #[test]
    fn test_split_preserves_prevalence() {
        let y = labels(100, 900);
        let p = stratified_split(&y, 0.3, 7).unwrap();

        let test_y: Array1<f64> = p.test.iter().map(|&i| y[i]).collect();
        let full = prevalence(&y);
        let test = prevalence(&test_y);
        assert!(
            (full - test).abs() < 0.02,
            "test prevalence {} drifted from cohort prevalence {}",
            test,
            full
        );
    }

    #[test]
    fn test_split_deterministic() {
        let y = labels(40, 160);
        let a = stratified_split(&y, 0.3, 99).unwrap();
        let b = stratified_split(&y, 0.3, 99).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_split_too_few_positives() {
        let y = labels(1, 50);
        assert!(matches!(
            stratified_split(&y, 0.3, 1),
            Err(PipelineError::DataInsufficiency(_))
        ));
    }

    #[test]
    fn test_k_fold_covers_everything_once() {
        let y = labels(25, 75);
        let folds = stratified_k_fold(&y, 5, 3).unwrap();
        assert_eq!(folds.len(), 5);

        let mut all_test: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 100);
            let test_y: Array1<f64> = fold.test.iter().map(|&i| y[i]).collect();
            assert!(test_y.iter().any(|&v| v > 0.5), "every fold holds positives");
        }
    }

    #[test]
    fn test_k_fold_insufficient_class() {
        let y = labels(3, 100);
        assert!(matches!(
            stratified_k_fold(&y, 5, 3),
            Err(PipelineError::DataInsufficiency(_))
        ));
    }
}
