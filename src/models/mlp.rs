//! Multilayer perceptron for binary outcomes
//!
//! Feedforward network with ReLU hidden layers and a single sigmoid output
//! unit, trained by mini-batch gradient descent with momentum and early
//! stopping on a held-back validation slice. Scale-sensitive: expects
//! standardized features.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// MLP configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub momentum: f64,
    /// Epochs without validation improvement before stopping
    pub early_stopping_patience: usize,
    /// Fraction of training rows held back for early stopping
    pub validation_fraction: f64,
    pub seed: Option<u64>,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64],
            learning_rate: 0.01,
            alpha: 1e-4,
            max_epochs: 200,
            batch_size: 32,
            momentum: 0.9,
            early_stopping_patience: 10,
            validation_fraction: 0.1,
            seed: Some(42),
        }
    }
}

/// Hyperparameter candidate sets for the MLP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpGrid {
    pub hidden_layers: Vec<Vec<usize>>,
    pub alpha: Vec<f64>,
    pub learning_rate: Vec<f64>,
}

impl Default for MlpGrid {
    fn default() -> Self {
        Self {
            hidden_layers: vec![vec![32], vec![64], vec![64, 32]],
            alpha: vec![1e-4, 1e-3],
            learning_rate: vec![0.01],
        }
    }
}

impl MlpGrid {
    pub fn candidates(&self) -> Vec<MlpConfig> {
        let mut out = Vec::new();
        for hidden in &self.hidden_layers {
            for &alpha in &self.alpha {
                for &learning_rate in &self.learning_rate {
                    out.push(MlpConfig {
                        hidden_layers: hidden.clone(),
                        alpha,
                        learning_rate,
                        ..Default::default()
                    });
                }
            }
        }
        out
    }
}

/// Fitted multilayer perceptron classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpClassifier {
    config: MlpConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    is_fitted: bool,
}

impl MlpClassifier {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            is_fitted: false,
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
        if n_samples < 4 {
            return Err(PipelineError::Training(
                "MLP needs at least 4 training rows".to_string(),
            ));
        }

        self.n_features = x.ncols();

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.initialize_weights(&mut rng);

        // Shuffle once so the validation slice is a random cut, not the
        // tail (which would be synthetic-heavy after oversampling)
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut rng);

        let val_size = ((n_samples as f64) * self.config.validation_fraction) as usize;
        let val_size = val_size.min(n_samples / 2);
        let (val_idx, train_idx) = indices.split_at(val_size);

        let x_val = gather_rows(x, val_idx);
        let y_val: Array1<f64> = Array1::from_iter(val_idx.iter().map(|&i| y[i]));
        let mut train_order: Vec<usize> = train_idx.to_vec();

        let mut velocities_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> =
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut best_val_loss = f64::INFINITY;
        let mut best_weights = self.weights.clone();
        let mut best_biases = self.biases.clone();
        let mut patience_counter = 0;

        for _epoch in 0..self.config.max_epochs {
            train_order.shuffle(&mut rng);

            for batch in train_order.chunks(self.config.batch_size.max(1)) {
                let x_batch = gather_rows(x, batch);
                let y_batch: Array1<f64> = Array1::from_iter(batch.iter().map(|&i| y[i]));
                self.train_batch(&x_batch, &y_batch, &mut velocities_w, &mut velocities_b);
            }

            let val_loss = if val_idx.is_empty() {
                // No validation slice: fall back to training loss
                let probs = self.forward(&gather_rows(x, &train_order)).1;
                log_loss(&probs, &Array1::from_iter(train_order.iter().map(|&i| y[i])))
            } else {
                let probs = self.forward(&x_val).1;
                log_loss(&probs, &y_val)
            };

            if val_loss < best_val_loss - 1e-6 {
                best_val_loss = val_loss;
                best_weights = self.weights.clone();
                best_biases = self.biases.clone();
                patience_counter = 0;
            } else {
                patience_counter += 1;
                if patience_counter >= self.config.early_stopping_patience {
                    break;
                }
            }
        }

        if !best_val_loss.is_finite() {
            return Err(PipelineError::Training(
                "MLP diverged: validation loss is not finite".to_string(),
            ));
        }

        self.weights = best_weights;
        self.biases = best_biases;
        self.is_fitted = true;
        Ok(())
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) {
        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(self.config.hidden_layers.iter().copied());
        layer_sizes.push(1);

        self.weights = Vec::with_capacity(layer_sizes.len() - 1);
        self.biases = Vec::with_capacity(layer_sizes.len() - 1);

        for pair in layer_sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let w = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit));
            self.weights.push(w);
            self.biases.push(Array1::zeros(fan_out));
        }
    }

    /// Forward pass: pre-activations per layer plus the output probabilities
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Array1<f64>) {
        let n_layers = self.weights.len();
        let mut activations = Vec::with_capacity(n_layers);
        let mut current = x.clone();

        for (l, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let mut z = current.dot(w);
            for mut row in z.rows_mut() {
                row += b;
            }
            current = if l + 1 < n_layers {
                z.mapv(|v| v.max(0.0)) // ReLU
            } else {
                z.mapv(|v| 1.0 / (1.0 + (-v).exp())) // sigmoid output
            };
            activations.push(current.clone());
        }

        let probs = current.column(0).to_owned();
        (activations, probs)
    }

    fn train_batch(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        velocities_w: &mut [Array2<f64>],
        velocities_b: &mut [Array1<f64>],
    ) {
        let n = x.nrows() as f64;
        let n_layers = self.weights.len();
        let (activations, probs) = self.forward(x);

        // Output delta for sigmoid + log loss
        let mut delta = Array2::from_shape_fn((x.nrows(), 1), |(i, _)| (probs[i] - y[i]) / n);

        for l in (0..n_layers).rev() {
            let input = if l == 0 { x } else { &activations[l - 1] };
            let grad_w = input.t().dot(&delta) + self.config.alpha * &self.weights[l];
            let grad_b = delta.sum_axis(ndarray::Axis(0));

            if l > 0 {
                // Backpropagate through the ReLU of the previous layer
                let upstream = delta.dot(&self.weights[l].t());
                delta = Array2::from_shape_fn(upstream.raw_dim(), |(i, j)| {
                    if activations[l - 1][[i, j]] > 0.0 {
                        upstream[[i, j]]
                    } else {
                        0.0
                    }
                });
            }

            velocities_w[l] =
                self.config.momentum * &velocities_w[l] - self.config.learning_rate * &grad_w;
            velocities_b[l] =
                self.config.momentum * &velocities_b[l] - self.config.learning_rate * &grad_b;
            self.weights[l] = &self.weights[l] + &velocities_w[l];
            self.biases[l] = &self.biases[l] + &velocities_b[l];
        }
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Shape {
                expected: format!("{} columns", self.n_features),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(self.forward(x).1)
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((indices.len(), x.ncols()), |(i, j)| x[[indices[i], j]])
}

fn log_loss(probs: &Array1<f64>, labels: &Array1<f64>) -> f64 {
    let eps = 1e-12;
    let n = probs.len().max(1) as f64;
    probs
        .iter()
        .zip(labels.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(eps, 1.0 - eps);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}
