//! Logistic regression, the calibration baseline
//!
//! L2-regularized logistic regression fitted by batch gradient descent.
//! Deterministic without a seed; every other family's improvement is
//! reported relative to this model.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Logistic regression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// L2 regularization strength
    pub alpha: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Gradient-norm convergence tolerance
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
        }
    }
}

/// Hyperparameter candidate set for logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticGrid {
    pub alpha: Vec<f64>,
}

impl Default for LogisticGrid {
    fn default() -> Self {
        Self {
            alpha: vec![1e-4, 1e-3, 1e-2, 1e-1],
        }
    }
}

impl LogisticGrid {
    pub fn candidates(&self) -> Vec<LogisticConfig> {
        self.alpha
            .iter()
            .map(|&alpha| LogisticConfig {
                alpha,
                ..Default::default()
            })
            .collect()
    }
}

/// Fitted logistic regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticConfig,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    is_fitted: bool,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
            is_fitted: false,
        }
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit on 0/1 labels by gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::Training(
                "cannot fit logistic regression on zero rows".to_string(),
            ));
        }

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;
        let lr = self.config.learning_rate;
        let alpha = self.config.alpha;

        for _iter in 0..self.config.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(PipelineError::Training(
                    "logistic regression diverged: non-finite gradient".to_string(),
                ));
            }
            if grad_norm < self.config.tol {
                break;
            }

            weights = weights - lr * &dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        self.is_fitted = true;
        Ok(())
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::NotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::Shape {
                expected: format!("{} columns", coefficients.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let linear = x.dot(coefficients) + self.intercept;
        Ok(Self::sigmoid(&linear))
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn config(&self) -> &LogisticConfig {
        &self.config
    }
}
