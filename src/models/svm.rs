//! Support vector classifier
//!
//! Binary SVC trained with a simplified SMO pass over a precomputed kernel
//! matrix. Probabilities come from a sigmoid of the decision function,
//! which is enough for ranking-based evaluation. Scale-sensitive: expects
//! standardized features.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Beyond this the eager kernel matrix risks OOM; training refuses.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Alphas below this are not support vectors
const SUPPORT_EPS: f64 = 1e-8;

/// Kernel function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// K(a, b) = a · b
    Linear,
    /// K(a, b) = exp(-γ ||a - b||²)
    Rbf { gamma: f64 },
}

impl Kernel {
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Kernel::Linear => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            Kernel::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * sq).exp()
            }
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kernel::Linear => write!(f, "linear"),
            Kernel::Rbf { gamma } => write!(f, "rbf(gamma={})", gamma),
        }
    }
}

/// SVC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvcConfig {
    /// Soft-margin penalty
    pub c: f64,
    pub kernel: Kernel,
    /// KKT violation tolerance
    pub tol: f64,
    /// Consecutive full passes without an update before stopping
    pub max_passes: usize,
    /// Hard cap on optimization sweeps
    pub max_iter: usize,
    /// Random seed (partner-index selection)
    pub seed: Option<u64>,
}

impl Default for SvcConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: Kernel::Rbf { gamma: 0.1 },
            tol: 1e-3,
            max_passes: 5,
            max_iter: 100,
            seed: Some(42),
        }
    }
}

/// Hyperparameter candidate sets for the SVC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcGrid {
    pub c: Vec<f64>,
    pub kernel: Vec<Kernel>,
}

impl Default for SvcGrid {
    fn default() -> Self {
        Self {
            c: vec![0.1, 1.0, 10.0],
            kernel: vec![
                Kernel::Linear,
                Kernel::Rbf { gamma: 0.01 },
                Kernel::Rbf { gamma: 0.1 },
            ],
        }
    }
}

impl SvcGrid {
    pub fn candidates(&self) -> Vec<SvcConfig> {
        let mut out = Vec::new();
        for &c in &self.c {
            for &kernel in &self.kernel {
                out.push(SvcConfig {
                    c,
                    kernel,
                    ..Default::default()
                });
            }
        }
        out
    }
}

/// Fitted support vector classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcClassifier {
    config: SvcConfig,
    support_vectors: Array2<f64>,
    /// α_k · y_k per support vector
    support_coeffs: Array1<f64>,
    bias: f64,
    is_fitted: bool,
}

impl SvcClassifier {
    pub fn new(config: SvcConfig) -> Self {
        Self {
            config,
            support_vectors: Array2::zeros((0, 0)),
            support_coeffs: Array1::zeros(0),
            bias: 0.0,
            is_fitted: false,
        }
    }

    /// Fit on 0/1 labels via simplified SMO
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::Training(format!(
                "SVC kernel matrix limited to {} samples, got {}",
                MAX_KERNEL_MATRIX_SAMPLES, n
            )));
        }

        // Signed labels
        let labels: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();
        if labels.iter().all(|&l| l > 0.0) || labels.iter().all(|&l| l < 0.0) {
            return Err(PipelineError::Training(
                "SVC requires both classes in the training target".to_string(),
            ));
        }

        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let kernel = {
            let mut k = Array2::zeros((n, n));
            for i in 0..n {
                for j in i..n {
                    let v = self.config.kernel.eval(&rows[i], &rows[j]);
                    k[[i, j]] = v;
                    k[[j, i]] = v;
                }
            }
            k
        };

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = vec![0.0f64; n];
        let mut b = 0.0f64;

        let decision = |alphas: &[f64], b: f64, kernel: &Array2<f64>, labels: &[f64], i: usize| {
            let mut f = b;
            for k in 0..alphas.len() {
                if alphas[k] > 0.0 {
                    f += alphas[k] * labels[k] * kernel[[k, i]];
                }
            }
            f
        };

        let mut passes = 0;
        let mut iters = 0;
        while passes < self.config.max_passes && iters < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, b, &kernel, &labels, i) - labels[i];

                let violates = (labels[i] * e_i < -tol && alphas[i] < c)
                    || (labels[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let e_j = decision(&alphas, b, &kernel, &labels, j) - labels[j];

                let (alpha_i_old, alpha_j_old) = (alphas[i], alphas[j]);
                let (low, high) = if labels[i] != labels[j] {
                    (
                        (alpha_j_old - alpha_i_old).max(0.0),
                        (c + alpha_j_old - alpha_i_old).min(c),
                    )
                } else {
                    (
                        (alpha_i_old + alpha_j_old - c).max(0.0),
                        (alpha_i_old + alpha_j_old).min(c),
                    )
                };
                if (high - low).abs() < 1e-12 {
                    continue;
                }

                let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let mut alpha_j_new = alpha_j_old - labels[j] * (e_i - e_j) / eta;
                alpha_j_new = alpha_j_new.clamp(low, high);
                if (alpha_j_new - alpha_j_old).abs() < 1e-5 {
                    continue;
                }

                let alpha_i_new =
                    alpha_i_old + labels[i] * labels[j] * (alpha_j_old - alpha_j_new);

                let b1 = b
                    - e_i
                    - labels[i] * (alpha_i_new - alpha_i_old) * kernel[[i, i]]
                    - labels[j] * (alpha_j_new - alpha_j_old) * kernel[[i, j]];
                let b2 = b
                    - e_j
                    - labels[i] * (alpha_i_new - alpha_i_old) * kernel[[i, j]]
                    - labels[j] * (alpha_j_new - alpha_j_old) * kernel[[j, j]];

                b = if alpha_i_new > 0.0 && alpha_i_new < c {
                    b1
                } else if alpha_j_new > 0.0 && alpha_j_new < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                alphas[i] = alpha_i_new;
                alphas[j] = alpha_j_new;
                num_changed += 1;
            }

            passes = if num_changed == 0 { passes + 1 } else { 0 };
            iters += 1;
        }

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > SUPPORT_EPS).collect();
        if support.is_empty() {
            return Err(PipelineError::Training(
                "SMO converged with no support vectors".to_string(),
            ));
        }

        self.support_vectors = x.select(Axis(0), &support);
        self.support_coeffs =
            Array1::from_iter(support.iter().map(|&i| alphas[i] * labels[i]));
        self.bias = b;
        self.is_fitted = true;
        Ok(())
    }

    /// Signed distance to the separating surface
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }

        let sv: Vec<Vec<f64>> = self
            .support_vectors
            .rows()
            .into_iter()
            .map(|r| r.to_vec())
            .collect();

        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            let r = row.to_vec();
            let mut f = self.bias;
            for (coeff, v) in self.support_coeffs.iter().zip(sv.iter()) {
                f += coeff * self.config.kernel.eval(v, &r);
            }
            f
        })))
    }

    /// Positive-class probability: sigmoid of the decision value
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let decision = self.decision_function(x)?;
        Ok(decision.mapv(|d| 1.0 / (1.0 + (-d).exp())))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.nrows()
    }

    pub fn config(&self) -> &SvcConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            data.extend([-2.0 - (i % 3) as f64 * 0.2, -1.0 - (i % 4) as f64 * 0.2]);
            labels.push(0.0);
        }
        for i in 0..12 {
            data.extend([2.0 + (i % 3) as f64 * 0.2, 1.0 + (i % 4) as f64 * 0.2]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((24, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_linear_kernel_separates() {
        let (x, y) = separable_data();
        let mut svc = SvcClassifier::new(SvcConfig {
            kernel: Kernel::Linear,
            ..Default::default()
        });
        svc.fit(&x, &y).unwrap();

        let probs = svc.predict_proba(&x).unwrap();
        let auc = crate::metrics::roc_auc(&probs, &y).unwrap();
        assert!(auc > 0.95, "AUC was {}", auc);
        assert!(svc.n_support_vectors() > 0);
    }

    #[test]
    fn test_rbf_kernel_separates() {
        let (x, y) = separable_data();
        let mut svc = SvcClassifier::new(SvcConfig {
            kernel: Kernel::Rbf { gamma: 0.5 },
            ..Default::default()
        });
        svc.fit(&x, &y).unwrap();

        let probs = svc.predict_proba(&x).unwrap();
        let auc = crate::metrics::roc_auc(&probs, &y).unwrap();
        assert!(auc > 0.9, "AUC was {}", auc);
    }

    #[test]
    fn test_single_class_fails() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut svc = SvcClassifier::new(SvcConfig::default());
        assert!(matches!(svc.fit(&x, &y), Err(PipelineError::Training(_))));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let (x, y) = separable_data();
        let config = SvcConfig {
            kernel: Kernel::Linear,
            seed: Some(3),
            ..Default::default()
        };

        let mut a = SvcClassifier::new(config.clone());
        a.fit(&x, &y).unwrap();
        let mut b = SvcClassifier::new(config);
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_kernel_display() {
        assert_eq!(Kernel::Linear.to_string(), "linear");
        assert_eq!(Kernel::Rbf { gamma: 0.1 }.to_string(), "rbf(gamma=0.1)");
    }
}
