//! Cohort assembly: dataset columns to numeric matrices
//!
//! The dataset stays a polars `DataFrame` at the boundary; everything past
//! assembly works on `ndarray` matrices. The cohort for an outcome is the
//! set of rows where that outcome is recorded: rows with a missing outcome
//! value are excluded up front, while missing predictor values survive as
//! NaN until the imputer fills them.

use crate::error::{PipelineError, Result};
use crate::registry::{REPAIR_CODE_EVAR, REPAIR_CODE_OPEN, REPAIR_TYPE};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fill value for a column with no observed values at all
const FALLBACK_FILL: f64 = 0.0;

/// Where imputation statistics come from.
///
/// `FullCohort` reproduces the original analysis: medians are computed over
/// the entire cohort before splitting, which leaks test-set information
/// into the imputation statistic. `TrainOnly` is the corrected mode; the
/// orchestrator then splits first and fits the imputer on training rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImputePolicy {
    #[default]
    FullCohort,
    TrainOnly,
}

/// Feature matrix and target vector for one outcome's cohort
#[derive(Debug, Clone)]
pub struct Cohort {
    /// Row-major features in predictor-list column order; may contain NaN
    pub x: Array2<f64>,
    /// Binary target, 0.0 / 1.0
    pub y: Array1<f64>,
    /// Original dataset row index of each cohort row
    pub rows: Vec<usize>,
}

/// Fail fast if any required column is absent from the dataset
pub fn validate_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for &col in columns {
        if df.column(col).is_err() {
            return Err(PipelineError::MissingColumn(col.to_string()));
        }
    }
    Ok(())
}

/// Replace a string-coded `REPAIR_TYPE` column (EVAR/OPEN) with numeric
/// codes. Numeric columns pass through untouched; unknown labels become
/// null and are treated like any other missing predictor value.
pub fn encode_repair_type(df: &DataFrame) -> Result<DataFrame> {
    let Ok(column) = df.column(REPAIR_TYPE) else {
        return Ok(df.clone());
    };
    let series = column.as_materialized_series();
    if series.dtype() != &DataType::String {
        return Ok(df.clone());
    }

    let ca = series
        .str()
        .map_err(|e| PipelineError::Data(e.to_string()))?;
    let encoded: Float64Chunked = ca
        .into_iter()
        .map(|opt| {
            opt.and_then(|label| match label {
                "EVAR" => Some(REPAIR_CODE_EVAR),
                "OPEN" => Some(REPAIR_CODE_OPEN),
                _ => None,
            })
        })
        .collect();

    let mut result = df.clone();
    result
        .with_column(encoded.with_name(REPAIR_TYPE.into()).into_series())
        .map_err(|e| PipelineError::Data(e.to_string()))?;
    Ok(result)
}

/// Project the dataset onto a predictor list and one outcome column.
///
/// Validates every referenced column before any extraction. The returned
/// feature matrix keeps the predictor-list column order and has one row per
/// cohort row (rows where the outcome is non-null).
pub fn assemble(df: &DataFrame, predictors: &[&str], outcome: &str) -> Result<Cohort> {
    validate_columns(df, predictors)?;
    validate_columns(df, &[outcome])?;

    let target_values = column_as_f64(df, outcome)?;
    let mut rows = Vec::with_capacity(target_values.len());
    let mut observed = Vec::with_capacity(target_values.len());
    for (i, value) in target_values.iter().enumerate() {
        if let Some(v) = value {
            rows.push(i);
            observed.push(*v);
        }
    }

    if rows.is_empty() {
        return Err(PipelineError::DataInsufficiency(format!(
            "outcome {} has no recorded values",
            outcome
        )));
    }

    let y = Array1::from_vec(observed);

    // Columns as contiguous f64 buffers, nulls preserved as NaN
    let col_data: Vec<Vec<f64>> = predictors
        .iter()
        .map(|&col| {
            let values = column_as_f64(df, col)?;
            Ok(rows
                .iter()
                .map(|&i| values[i].unwrap_or(f64::NAN))
                .collect())
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let x = Array2::from_shape_fn((rows.len(), predictors.len()), |(r, c)| col_data[c][r]);

    Ok(Cohort { x, y, rows })
}

pub(crate) fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::Data(format!("column {}: {}", name, e)))?;
    Ok(casted
        .f64()
        .map_err(|e| PipelineError::Data(format!("column {}: {}", name, e)))?
        .into_iter()
        .collect())
}

/// Per-column median imputer.
///
/// Fitted once from a chosen row set, then applied to any matrix with the
/// same column layout. The fitted statistics never change after
/// construction, so transforming the same row twice is identical and the
/// fit is invariant to row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    fill: Array1<f64>,
}

impl MedianImputer {
    /// Fit on every row of the matrix
    pub fn fit(x: &Array2<f64>) -> Self {
        let all: Vec<usize> = (0..x.nrows()).collect();
        Self::fit_rows(x, &all)
    }

    /// Fit on a subset of rows (training partition in corrected mode)
    pub fn fit_rows(x: &Array2<f64>, rows: &[usize]) -> Self {
        let fill = Array1::from_iter((0..x.ncols()).map(|c| {
            let mut observed: Vec<f64> = rows
                .iter()
                .map(|&r| x[[r, c]])
                .filter(|v| !v.is_nan())
                .collect();
            if observed.is_empty() {
                return FALLBACK_FILL;
            }
            observed.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = observed.len() / 2;
            if observed.len() % 2 == 0 {
                (observed[mid - 1] + observed[mid]) / 2.0
            } else {
                observed[mid]
            }
        }));
        Self { fill }
    }

    /// Replace every NaN with the fitted column median, in place
    pub fn transform(&self, x: &mut Array2<f64>) -> Result<()> {
        if x.ncols() != self.fill.len() {
            return Err(PipelineError::Shape {
                expected: format!("{} columns", self.fill.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        for mut row in x.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                if v.is_nan() {
                    *v = self.fill[c];
                }
            }
        }
        Ok(())
    }

    /// Fitted fill value per column
    pub fn fill_values(&self) -> &Array1<f64> {
        &self.fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_df() -> DataFrame {
        df!(
            "AGE" => &[Some(70.0), Some(80.0), None, Some(60.0)],
            "AAA_DIAMETER" => &[Some(5.5), Some(6.0), Some(7.0), None],
            "MORT_30D" => &[Some(0.0), Some(1.0), Some(0.0), None]
        )
        .unwrap()
    }

    #[test]
    fn test_assemble_excludes_missing_outcome_rows() {
        let df = toy_df();
        let cohort = assemble(&df, &["AGE", "AAA_DIAMETER"], "MORT_30D").unwrap();

        assert_eq!(cohort.rows, vec![0, 1, 2]);
        assert_eq!(cohort.x.nrows(), 3);
        assert_eq!(cohort.x.ncols(), 2);
        assert_eq!(cohort.y.len(), 3);
        assert!(cohort.x[[2, 0]].is_nan(), "missing predictor survives as NaN");
    }

    #[test]
    fn test_assemble_missing_column_is_config_error() {
        let df = toy_df();
        let err = assemble(&df, &["AGE", "NO_SUCH_COLUMN"], "MORT_30D").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(_)));
    }

    #[test]
    fn test_median_imputer_fills_all_nan() {
        let df = toy_df();
        let mut cohort = assemble(&df, &["AGE", "AAA_DIAMETER"], "MORT_30D").unwrap();

        let imputer = MedianImputer::fit(&cohort.x);
        imputer.transform(&mut cohort.x).unwrap();

        assert!(cohort.x.iter().all(|v| !v.is_nan()));
        // Median of {70, 80} = 75 fills row 2 of AGE
        assert!((cohort.x[[2, 0]] - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_imputer_row_order_invariance() {
        let x = ndarray::array![[1.0, f64::NAN], [3.0, 2.0], [5.0, 4.0], [7.0, 6.0]];
        let forward = MedianImputer::fit_rows(&x, &[0, 1, 2, 3]);
        let permuted = MedianImputer::fit_rows(&x, &[3, 1, 0, 2]);
        assert_eq!(forward.fill_values(), permuted.fill_values());
    }

    #[test]
    fn test_all_missing_column_falls_back() {
        let x = ndarray::array![[f64::NAN], [f64::NAN]];
        let imputer = MedianImputer::fit(&x);
        assert_eq!(imputer.fill_values()[0], 0.0);
    }

    #[test]
    fn test_encode_repair_type_strings() {
        let df = df!(
            "REPAIR_TYPE" => &["EVAR", "OPEN", "EVAR"],
            "MORT_30D" => &[0.0, 1.0, 0.0]
        )
        .unwrap();

        let encoded = encode_repair_type(&df).unwrap();
        let cohort = assemble(&encoded, &["REPAIR_TYPE"], "MORT_30D").unwrap();
        assert_eq!(cohort.x[[0, 0]], REPAIR_CODE_EVAR);
        assert_eq!(cohort.x[[1, 0]], REPAIR_CODE_OPEN);
    }
}
