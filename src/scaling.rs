//! Feature standardization
//!
//! z-score scaling fitted on the balanced training matrix and reused for
//! both partitions of an outcome run. The fitted statistics are immutable
//! after construction, so a scaler cannot be refit on test data by
//! accident. Only scale-sensitive families (SVC, MLP) consume scaled
//! features.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Fitted (x - mean) / std transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and sample standard deviation.
    ///
    /// Zero-variance columns get a scale of 1.0 so constant features pass
    /// through centered instead of producing NaN.
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = x
            .std_axis(Axis(0), 1.0)
            .mapv(|s| if s == 0.0 || s.is_nan() { 1.0 } else { s });
        Self { mean, std }
    }

    /// Apply the fitted transform to any matrix with the same column layout
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::Shape {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(Array2::from_shape_fn(x.raw_dim(), |(i, j)| {
            (x[[i, j]] - self.mean[j]) / self.std[j]
        }))
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_centers_and_scales() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let scaler = StandardScaler::fit(&x);
        let scaled = scaler.transform(&x).unwrap();

        for j in 0..2 {
            let col_mean = scaled.column(j).mean().unwrap();
            assert!(col_mean.abs() < 1e-10, "column {} mean {}", j, col_mean);
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let train = array![[1.0], [2.0], [3.0]];
        let test = array![[4.0], [5.0]];
        let scaler = StandardScaler::fit(&train);

        let once = scaler.transform(&test).unwrap();
        let twice = scaler.transform(&test).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fit_is_row_order_invariant() {
        let a = array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0]];
        let b = array![[3.0, 7.0], [1.0, 5.0], [2.0, 6.0]];

        let sa = StandardScaler::fit(&a);
        let sb = StandardScaler::fit(&b);
        for j in 0..2 {
            assert!((sa.mean()[j] - sb.mean()[j]).abs() < 1e-12);
            assert!((sa.std()[j] - sb.std()[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_does_not_blow_up() {
        let x = array![[2.0], [2.0], [2.0]];
        let scaler = StandardScaler::fit(&x);
        let scaled = scaler.transform(&x).unwrap();
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_column_mismatch_is_error() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(scaler.transform(&array![[1.0], [2.0]]).is_err());
    }
}
