//! Minority-class oversampling for the training partition
//!
//! Synthesizes minority samples by interpolating between each minority
//! sample and one of its nearest minority-class neighbors until the class
//! counts are equal. Applied to training data only; the test partition
//! never sees synthetic rows.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Balanced training set: originals first, synthetic rows appended
#[derive(Debug, Clone)]
pub struct BalancedSet {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Number of synthetic minority rows appended
    pub n_synthetic: usize,
}

/// Neighbor-interpolation oversampler (binary targets)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinorityOversampler {
    k_neighbors: usize,
    seed: u64,
}

impl MinorityOversampler {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self {
            k_neighbors: k_neighbors.max(1),
            seed,
        }
    }

    /// Euclidean distance between two rows
    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest neighbors within `data`, excluding the point itself.
    /// BinaryHeap keeps this O(n log k) per query.
    fn find_neighbors(point_idx: usize, data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let point = &data[point_idx];
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, d) in data.iter().enumerate() {
            if i == point_idx {
                continue;
            }
            let dist = Self::distance(point, d);
            if heap.len() < k {
                heap.push(DistIdx(dist, i));
            } else if let Some(&DistIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistIdx(dist, i));
                }
            }
        }

        heap.into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Balance the classes by synthesizing minority rows.
    ///
    /// After a successful call the positive and negative counts are exactly
    /// equal. Fewer than two minority samples leave no segment to
    /// interpolate along, which is a data-insufficiency error the caller
    /// decides how to handle.
    pub fn balance(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<BalancedSet> {
        if x.nrows() != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let positives: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.5)
            .map(|(i, _)| i)
            .collect();
        let n_pos = positives.len();
        let n_neg = y.len() - n_pos;

        if n_pos == 0 || n_neg == 0 {
            return Err(PipelineError::DataInsufficiency(
                "both classes must be present to balance".to_string(),
            ));
        }

        let (minority_idx, minority_label, deficit) = if n_pos < n_neg {
            (positives, 1.0, n_neg - n_pos)
        } else {
            let negatives: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v <= 0.5)
                .map(|(i, _)| i)
                .collect();
            (negatives, 0.0, n_pos - n_neg)
        };

        if deficit == 0 {
            return Ok(BalancedSet {
                x: x.clone(),
                y: y.clone(),
                n_synthetic: 0,
            });
        }

        if minority_idx.len() < 2 {
            return Err(PipelineError::DataInsufficiency(format!(
                "minority class has {} sample(s); need at least 2 to interpolate",
                minority_idx.len()
            )));
        }

        let minority_rows: Vec<Vec<f64>> = minority_idx
            .iter()
            .map(|&i| x.row(i).iter().copied().collect())
            .collect();
        let k = self.k_neighbors.min(minority_rows.len() - 1);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut synthetic: Vec<Vec<f64>> = Vec::with_capacity(deficit);

        while synthetic.len() < deficit {
            let idx = rng.gen_range(0..minority_rows.len());
            let neighbors = Self::find_neighbors(idx, &minority_rows, k);
            if neighbors.is_empty() {
                continue;
            }
            let neighbor = &minority_rows[neighbors[rng.gen_range(0..neighbors.len())]];

            let gap: f64 = rng.gen();
            let sample = minority_rows[idx]
                .iter()
                .zip(neighbor.iter())
                .map(|(&p, &n)| p + gap * (n - p))
                .collect();
            synthetic.push(sample);
        }

        let n_original = x.nrows();
        let n_features = x.ncols();
        let balanced_x = Array2::from_shape_fn((n_original + deficit, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic[i - n_original][j]
            }
        });

        let mut balanced_y: Vec<f64> = y.iter().copied().collect();
        balanced_y.extend(std::iter::repeat(minority_label).take(deficit));

        Ok(BalancedSet {
            x: balanced_x,
            y: Array1::from_vec(balanced_y),
            n_synthetic: deficit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced_data() -> (Array2<f64>, Array1<f64>) {
        // 20 negatives around the origin, 5 positives around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0.0);
        }
        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((25, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_exact_balance() {
        let (x, y) = imbalanced_data();
        let balanced = MinorityOversampler::new(3, 42).balance(&x, &y).unwrap();

        let pos = balanced.y.iter().filter(|&&v| v > 0.5).count();
        let neg = balanced.y.len() - pos;
        assert_eq!(pos, neg, "classes must be exactly equal after balancing");
        assert_eq!(balanced.n_synthetic, 15);
    }

    #[test]
    fn test_originals_preserved() {
        let (x, y) = imbalanced_data();
        let balanced = MinorityOversampler::new(3, 42).balance(&x, &y).unwrap();

        for i in 0..x.nrows() {
            for j in 0..x.ncols() {
                assert_eq!(balanced.x[[i, j]], x[[i, j]]);
            }
        }
    }

    #[test]
    fn test_synthetic_rows_stay_in_minority_hull() {
        let (x, y) = imbalanced_data();
        let balanced = MinorityOversampler::new(3, 42).balance(&x, &y).unwrap();

        // Interpolation cannot leave the bounding box of the minority cluster
        for i in x.nrows()..balanced.x.nrows() {
            assert!(balanced.x[[i, 0]] >= 10.0 && balanced.x[[i, 0]] <= 12.0);
            assert!(balanced.x[[i, 1]] >= 10.0 && balanced.x[[i, 1]] <= 11.0);
        }
    }

    #[test]
    fn test_deterministic_given_seed() {
        let (x, y) = imbalanced_data();
        let a = MinorityOversampler::new(3, 7).balance(&x, &y).unwrap();
        let b = MinorityOversampler::new(3, 7).balance(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_single_minority_sample_is_error() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 10.0]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            MinorityOversampler::new(5, 1).balance(&x, &y),
            Err(PipelineError::DataInsufficiency(_))
        ));
    }

    #[test]
    fn test_already_balanced_passthrough() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        let balanced = MinorityOversampler::new(3, 1).balance(&x, &y).unwrap();
        assert_eq!(balanced.n_synthetic, 0);
        assert_eq!(balanced.x, x);
    }
}
