//! Clinical subgroup analysis
//!
//! Recomputes discrimination on test-partition slices defined by clinical
//! criteria. Subgroup results are purely descriptive: they never feed back
//! into model selection, and masks may overlap freely. Masks evaluate on
//! the raw (unscaled) test features so thresholds stay in clinical units.

use crate::error::Result;
use crate::metrics::roc_auc;
use crate::registry::{REPAIR_CODE_EVAR, REPAIR_CODE_OPEN, REPAIR_TYPE, RUPTURED};
use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::warn;

/// Smallest subgroup worth a numeric estimate; at or below this the score
/// is reported as insufficient rather than unreliable.
pub const MIN_SUBGROUP_SIZE: usize = 50;

/// Membership rule applied to one predictor column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SubgroupRule {
    AtLeast(f64),
    LessThan(f64),
    Equals(f64),
}

impl SubgroupRule {
    fn matches(&self, value: f64) -> bool {
        match self {
            SubgroupRule::AtLeast(t) => value >= *t,
            SubgroupRule::LessThan(t) => value < *t,
            SubgroupRule::Equals(t) => (value - t).abs() < 1e-9,
        }
    }
}

/// A named clinical partition criterion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgroupSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub rule: SubgroupRule,
}

/// The standard subgroup set for AAA repair cohorts
pub fn default_subgroups() -> Vec<SubgroupSpec> {
    vec![
        SubgroupSpec { name: "age >= 70", column: "AGE", rule: SubgroupRule::AtLeast(70.0) },
        SubgroupSpec { name: "age < 70", column: "AGE", rule: SubgroupRule::LessThan(70.0) },
        SubgroupSpec {
            name: "ruptured presentation",
            column: RUPTURED,
            rule: SubgroupRule::Equals(1.0),
        },
        SubgroupSpec {
            name: "endovascular repair",
            column: REPAIR_TYPE,
            rule: SubgroupRule::Equals(REPAIR_CODE_EVAR),
        },
        SubgroupSpec {
            name: "open repair",
            column: REPAIR_TYPE,
            rule: SubgroupRule::Equals(REPAIR_CODE_OPEN),
        },
        SubgroupSpec {
            name: "aneurysm >= 6 cm",
            column: "AAA_DIAMETER",
            rule: SubgroupRule::AtLeast(6.0),
        },
    ]
}

/// Discrimination restricted to one subgroup of the test partition
#[derive(Debug, Clone, Serialize)]
pub struct SubgroupScore {
    pub name: &'static str,
    /// Test-partition members matching the rule
    pub n: usize,
    /// AUC within the subgroup; `None` when the sample is too small or the
    /// subgroup holds a single outcome class
    pub auc: Option<f64>,
}

/// Score the best model's test probabilities on each subgroup mask.
///
/// `x_test` must be the raw (pre-scaling) test features in predictor-list
/// column order; `predictors` maps columns to names. Specs referencing a
/// column outside the active predictor list are skipped with a warning;
/// a configuration mismatch, not a data error.
pub fn analyze_subgroups(
    specs: &[SubgroupSpec],
    predictors: &[&str],
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    probabilities: &Array1<f64>,
) -> Result<Vec<SubgroupScore>> {
    let mut scores = Vec::with_capacity(specs.len());

    for spec in specs {
        let Some(col_idx) = predictors.iter().position(|&c| c == spec.column) else {
            warn!(
                subgroup = spec.name,
                column = spec.column,
                "subgroup column not in the active predictor tier; skipping"
            );
            continue;
        };

        let members: Vec<usize> = (0..x_test.nrows())
            .filter(|&i| spec.rule.matches(x_test[[i, col_idx]]))
            .collect();
        let n = members.len();

        if n <= MIN_SUBGROUP_SIZE {
            scores.push(SubgroupScore { name: spec.name, n, auc: None });
            continue;
        }

        let sub_probs: Array1<f64> = members.iter().map(|&i| probabilities[i]).collect();
        let sub_labels: Array1<f64> = members.iter().map(|&i| y_test[i]).collect();

        match roc_auc(&sub_probs, &sub_labels) {
            Ok(auc) => scores.push(SubgroupScore { name: spec.name, n, auc: Some(auc) }),
            Err(e) => {
                warn!(subgroup = spec.name, n, error = %e, "subgroup AUC undefined");
                scores.push(SubgroupScore { name: spec.name, n, auc: None });
            }
        }
    }

    Ok(scores)
}
