//! Outcome orchestrator
//!
//! Drives the per-outcome sequence ASSEMBLE → SPLIT → BALANCE → SCALE →
//! TRAIN(×5) → EVALUATE(×5) → SUMMARIZE → SUBGROUP for each registered
//! outcome, then the standalone rupture-mortality comparison. Outcome runs
//! are independent: the only shared state is the read-only dataset, so a
//! failure anywhere is folded into that outcome's result and the run moves
//! on.

use crate::dataset::{
    assemble, column_as_f64, encode_repair_type, validate_columns, ImputePolicy, MedianImputer,
};
use crate::error::Result;
use crate::metrics::{brier_score, prevalence, roc_auc};
use crate::models::{default_grids, FamilyGrid, FamilyParams, ModelFamily};
use crate::registry::{
    predictor_columns, OutcomeSpec, PredictorTier, OUTCOMES, REPAIR_CODE_OPEN, REPAIR_TYPE,
    RUPTURED,
};
use crate::sampling::MinorityOversampler;
use crate::scaling::StandardScaler;
use crate::search::{grid_search, SearchConfig};
use crate::split::stratified_split;
use crate::subgroup::{analyze_subgroups, default_subgroups, SubgroupScore, SubgroupSpec};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, warn};

/// Run-level configuration shared by every outcome run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base seed; splits, sampling, CV folds and model fits all derive
    /// from it, so a fixed seed reproduces every score bit for bit
    pub seed: u64,
    /// Held-out test fraction
    pub test_fraction: f64,
    /// Cross-validation fold count inside the grid search
    pub cv_folds: usize,
    /// Predictor tier fed to every model
    pub tier: PredictorTier,
    /// Where imputation statistics come from
    pub impute: ImputePolicy,
    /// Optional cap on evaluated grid candidates per family
    pub max_candidates: Option<usize>,
    /// Neighbor count for minority oversampling
    pub oversample_neighbors: usize,
    /// Family search spaces, in registry order
    pub grids: Vec<FamilyGrid>,
    /// Subgroup criteria evaluated against the best model per outcome
    pub subgroups: Vec<SubgroupSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.30,
            cv_folds: 5,
            tier: PredictorTier::Preop,
            impute: ImputePolicy::FullCohort,
            max_candidates: None,
            oversample_neighbors: 5,
            grids: default_grids(),
            subgroups: default_subgroups(),
        }
    }
}

/// Everything measured for one successfully trained family
#[derive(Debug, Clone, Serialize)]
pub struct FamilyEvaluation {
    pub params: FamilyParams,
    /// Mean cross-validated AUC of the winning candidate
    pub cv_auc: f64,
    /// Held-out test AUC
    pub test_auc: f64,
    /// Held-out Brier score
    pub brier: f64,
    /// Positive-class probabilities aligned to the test partition
    pub probabilities: Vec<f64>,
}

/// Per-family result: a trained payload or a structured failure reason
#[derive(Debug, Clone, Serialize)]
pub enum FamilyOutcome {
    Trained(FamilyEvaluation),
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    pub family: ModelFamily,
    pub outcome: FamilyOutcome,
}

impl FamilyReport {
    pub fn evaluation(&self) -> Option<&FamilyEvaluation> {
        match &self.outcome {
            FamilyOutcome::Trained(eval) => Some(eval),
            FamilyOutcome::Failed { .. } => None,
        }
    }
}

/// Cross-family summary for one outcome
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub best_family: ModelFamily,
    pub best_auc: f64,
    pub best_brier: f64,
    /// Logistic-regression AUC, when that family trained
    pub baseline_auc: Option<f64>,
    /// best_auc − baseline_auc
    pub improvement: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub enum OutcomeStatus {
    Complete,
    Skipped { reason: String },
}

/// Full result of one outcome run
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeResult {
    pub spec: OutcomeSpec,
    pub status: OutcomeStatus,
    pub n_cohort: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub cohort_prevalence: f64,
    pub families: Vec<FamilyReport>,
    pub summary: Option<SummaryRecord>,
    pub subgroups: Vec<SubgroupScore>,
}

impl OutcomeResult {
    fn skipped(spec: OutcomeSpec, reason: String) -> Self {
        Self {
            spec,
            status: OutcomeStatus::Skipped { reason },
            n_cohort: 0,
            n_train: 0,
            n_test: 0,
            cohort_prevalence: 0.0,
            families: Vec::new(),
            summary: None,
            subgroups: Vec::new(),
        }
    }
}

/// 30-day mortality among ruptured cases for one repair approach
#[derive(Debug, Clone, Serialize)]
pub struct RuptureMortality {
    pub n: usize,
    pub deaths: usize,
    pub rate: f64,
}

/// EVAR vs OPEN mortality after rupture; an arm is `None` when its group
/// is empty
#[derive(Debug, Clone, Serialize)]
pub struct RuptureComparison {
    pub evar: Option<RuptureMortality>,
    pub open: Option<RuptureMortality>,
}

/// Results of a whole pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub outcomes: Vec<OutcomeResult>,
    pub rupture: Option<RuptureComparison>,
}

/// Run every registered outcome plus the rupture comparison
pub fn run(df: &DataFrame, config: &PipelineConfig) -> Result<PipelineReport> {
    let df = encode_repair_type(df)?;
    let predictors = predictor_columns(config.tier);

    let outcomes: Vec<OutcomeResult> = OUTCOMES
        .iter()
        .map(|spec| run_outcome(&df, *spec, &predictors, config))
        .collect();

    let rupture = match rupture_mortality(&df) {
        Ok(comparison) => Some(comparison),
        Err(e) => {
            warn!(error = %e, "rupture-mortality comparison skipped");
            None
        }
    };

    Ok(PipelineReport { outcomes, rupture })
}

/// One outcome's full run. Never fails the caller: every error becomes a
/// skipped status or a per-family failure, logged with its reason.
pub fn run_outcome(
    df: &DataFrame,
    spec: OutcomeSpec,
    predictors: &[&str],
    config: &PipelineConfig,
) -> OutcomeResult {
    // ASSEMBLE
    let mut cohort = match assemble(df, predictors, spec.column) {
        Ok(cohort) => cohort,
        Err(e) => {
            warn!(outcome = spec.column, error = %e, "outcome skipped at assembly");
            return OutcomeResult::skipped(spec, e.to_string());
        }
    };

    let n_cohort = cohort.x.nrows();
    let cohort_prevalence = prevalence(&cohort.y);
    info!(
        outcome = spec.column,
        n = n_cohort,
        prevalence = format!("{:.3}", cohort_prevalence),
        "starting outcome run"
    );

    if config.impute == ImputePolicy::FullCohort {
        // Faithful mode: statistics see the whole cohort before the split
        let imputer = MedianImputer::fit(&cohort.x);
        if let Err(e) = imputer.transform(&mut cohort.x) {
            return OutcomeResult::skipped(spec, e.to_string());
        }
    }

    // SPLIT
    let partition = match stratified_split(&cohort.y, config.test_fraction, config.seed) {
        Ok(partition) => partition,
        Err(e) => {
            warn!(outcome = spec.column, error = %e, "outcome skipped at split");
            return OutcomeResult::skipped(spec, e.to_string());
        }
    };

    if config.impute == ImputePolicy::TrainOnly {
        let imputer = MedianImputer::fit_rows(&cohort.x, &partition.train);
        if let Err(e) = imputer.transform(&mut cohort.x) {
            return OutcomeResult::skipped(spec, e.to_string());
        }
    }

    let x_train = cohort.x.select(Axis(0), &partition.train);
    let y_train: Array1<f64> = partition.train.iter().map(|&i| cohort.y[i]).collect();
    let x_test = cohort.x.select(Axis(0), &partition.test);
    let y_test: Array1<f64> = partition.test.iter().map(|&i| cohort.y[i]).collect();

    // BALANCE: training partition only; test rows never see synthetic data
    let oversampler = MinorityOversampler::new(config.oversample_neighbors, config.seed);
    let (x_balanced, y_balanced) = match oversampler.balance(&x_train, &y_train) {
        Ok(balanced) => {
            info!(
                outcome = spec.column,
                synthetic = balanced.n_synthetic,
                "training partition balanced"
            );
            (balanced.x, balanced.y)
        }
        Err(e) => {
            warn!(outcome = spec.column, error = %e, "imbalance correction skipped");
            (x_train, y_train)
        }
    };

    // SCALE: fitted once on the balanced training matrix
    let scaler = StandardScaler::fit(&x_balanced);
    let (x_balanced_scaled, x_test_scaled) =
        match (scaler.transform(&x_balanced), scaler.transform(&x_test)) {
            (Ok(train), Ok(test)) => (train, test),
            (Err(e), _) | (_, Err(e)) => {
                return OutcomeResult::skipped(spec, e.to_string());
            }
        };

    // TRAIN x5, EVALUATE x5: each family isolated
    let search_config = SearchConfig {
        cv_folds: config.cv_folds,
        seed: config.seed,
        max_candidates: config.max_candidates,
    };

    let families: Vec<FamilyReport> = config
        .grids
        .iter()
        .map(|grid| {
            let family = grid.family();
            let (train_x, train_y, eval_x) = if family.needs_scaling() {
                (&x_balanced_scaled, &y_balanced, &x_test_scaled)
            } else {
                (&x_balanced, &y_balanced, &x_test)
            };

            let outcome = train_and_evaluate(grid, train_x, train_y, eval_x, &y_test, &search_config);
            match &outcome {
                FamilyOutcome::Trained(eval) => info!(
                    outcome = spec.column,
                    family = %family,
                    cv_auc = format!("{:.4}", eval.cv_auc),
                    test_auc = format!("{:.4}", eval.test_auc),
                    brier = format!("{:.4}", eval.brier),
                    params = %eval.params,
                    "family trained"
                ),
                FamilyOutcome::Failed { reason } => warn!(
                    outcome = spec.column,
                    family = %family,
                    reason = %reason,
                    "family excluded from this outcome"
                ),
            }
            FamilyReport { family, outcome }
        })
        .collect();

    // SUMMARIZE
    let summary = summarize(&families);
    if summary.is_none() {
        warn!(outcome = spec.column, "every model family failed; outcome skipped");
        let mut result = OutcomeResult::skipped(
            spec,
            "every model family failed".to_string(),
        );
        result.n_cohort = n_cohort;
        result.n_train = partition.train.len();
        result.n_test = partition.test.len();
        result.cohort_prevalence = cohort_prevalence;
        result.families = families;
        return result;
    }

    // SUBGROUP: descriptive only, on the best model probabilities
    let subgroups = summary
        .as_ref()
        .and_then(|s| {
            families
                .iter()
                .find(|r| r.family == s.best_family)
                .and_then(FamilyReport::evaluation)
        })
        .map(|best| {
            let probs = Array1::from_vec(best.probabilities.clone());
            analyze_subgroups(&config.subgroups, predictors, &x_test, &y_test, &probs)
                .unwrap_or_default()
        })
        .unwrap_or_default();

    OutcomeResult {
        spec,
        status: OutcomeStatus::Complete,
        n_cohort,
        n_train: partition.train.len(),
        n_test: partition.test.len(),
        cohort_prevalence,
        families,
        summary,
        subgroups,
    }
}

/// Grid-search one family and evaluate the refitted winner on held-out data
fn train_and_evaluate(
    grid: &FamilyGrid,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    search_config: &SearchConfig,
) -> FamilyOutcome {
    let searched = match grid_search(grid, x_train, y_train, search_config) {
        Ok(searched) => searched,
        Err(e) => return FamilyOutcome::Failed { reason: e.to_string() },
    };

    let evaluated = searched
        .model
        .predict_proba(x_test)
        .and_then(|probs| {
            let test_auc = roc_auc(&probs, y_test)?;
            let brier = brier_score(&probs, y_test)?;
            Ok(FamilyEvaluation {
                params: searched.params.clone(),
                cv_auc: searched.mean_cv_auc,
                test_auc,
                brier,
                probabilities: probs.to_vec(),
            })
        });

    match evaluated {
        Ok(eval) => FamilyOutcome::Trained(eval),
        Err(e) => FamilyOutcome::Failed { reason: e.to_string() },
    }
}

/// Pick the best family by test AUC with registry-order tie-break; failed
/// families simply do not compete. `None` when nothing trained.
pub fn summarize(families: &[FamilyReport]) -> Option<SummaryRecord> {
    let mut best: Option<(ModelFamily, f64, f64)> = None;
    for report in families {
        if let Some(eval) = report.evaluation() {
            // Strictly-greater keeps the earlier family on exact ties
            if best.map_or(true, |(_, auc, _)| eval.test_auc > auc) {
                best = Some((report.family, eval.test_auc, eval.brier));
            }
        }
    }

    let (best_family, best_auc, best_brier) = best?;
    let baseline_auc = families
        .iter()
        .find(|r| r.family == ModelFamily::Logistic)
        .and_then(FamilyReport::evaluation)
        .map(|eval| eval.test_auc);

    Some(SummaryRecord {
        best_family,
        best_auc,
        best_brier,
        baseline_auc,
        improvement: baseline_auc.map(|b| best_auc - b),
    })
}

/// 30-day mortality among ruptured aneurysms, split by repair approach
pub fn rupture_mortality(df: &DataFrame) -> Result<RuptureComparison> {
    validate_columns(df, &[RUPTURED, REPAIR_TYPE, "MORT_30D"])?;

    let ruptured = column_as_f64(df, RUPTURED)?;
    let repair = column_as_f64(df, REPAIR_TYPE)?;
    let mortality = column_as_f64(df, "MORT_30D")?;

    let mut evar = (0usize, 0usize);
    let mut open = (0usize, 0usize);

    for i in 0..df.height() {
        let (Some(r), Some(kind), Some(dead)) = (ruptured[i], repair[i], mortality[i]) else {
            continue;
        };
        if r <= 0.5 {
            continue;
        }
        let arm = if (kind - REPAIR_CODE_OPEN).abs() < 1e-9 {
            &mut open
        } else {
            &mut evar
        };
        arm.0 += 1;
        if dead > 0.5 {
            arm.1 += 1;
        }
    }

    let to_rate = |(n, deaths): (usize, usize)| {
        (n > 0).then(|| RuptureMortality {
            n,
            deaths,
            rate: deaths as f64 / n as f64,
        })
    };

    Ok(RuptureComparison {
        evar: to_rate(evar),
        open: to_rate(open),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{GbdtConfig, LogisticConfig};
    use polars::prelude::*;

    fn trained(family: ModelFamily, params: FamilyParams, test_auc: f64) -> FamilyReport {
        FamilyReport {
            family,
            outcome: FamilyOutcome::Trained(FamilyEvaluation {
                params,
                cv_auc: test_auc,
                test_auc,
                brier: 0.1,
                probabilities: vec![0.5; 4],
            }),
        }
    }

    fn failed(family: ModelFamily) -> FamilyReport {
        FamilyReport {
            family,
            outcome: FamilyOutcome::Failed {
                reason: "synthetic failure".to_string(),
            },
        }
    }

    #[test]
    fn test_summarize_ignores_failed_families() {
        let families = vec![
            failed(ModelFamily::GradientBoosting),
            trained(
                ModelFamily::RandomForest,
                FamilyParams::RandomForest(Default::default()),
                0.80,
            ),
            trained(
                ModelFamily::Logistic,
                FamilyParams::Logistic(LogisticConfig::default()),
                0.70,
            ),
        ];

        let summary = summarize(&families).unwrap();
        assert_eq!(summary.best_family, ModelFamily::RandomForest);
        assert_eq!(summary.baseline_auc, Some(0.70));
        assert!((summary.improvement.unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_tie_break_prefers_registry_order() {
        let families = vec![
            trained(
                ModelFamily::GradientBoosting,
                FamilyParams::GradientBoosting(GbdtConfig::default()),
                0.75,
            ),
            trained(
                ModelFamily::RandomForest,
                FamilyParams::RandomForest(Default::default()),
                0.75,
            ),
        ];

        let summary = summarize(&families).unwrap();
        assert_eq!(summary.best_family, ModelFamily::GradientBoosting);
    }

    #[test]
    fn test_summarize_all_failed_is_none() {
        let families = vec![
            failed(ModelFamily::GradientBoosting),
            failed(ModelFamily::Logistic),
        ];
        assert!(summarize(&families).is_none());
    }

    #[test]
    fn test_summarize_without_baseline() {
        let families = vec![
            trained(
                ModelFamily::GradientBoosting,
                FamilyParams::GradientBoosting(GbdtConfig::default()),
                0.8,
            ),
            failed(ModelFamily::Logistic),
        ];

        let summary = summarize(&families).unwrap();
        assert_eq!(summary.baseline_auc, None);
        assert_eq!(summary.improvement, None);
    }

    #[test]
    fn test_rupture_mortality_two_arms() {
        let df = df!(
            "RUPTURED" => &[1.0, 1.0, 1.0, 1.0, 0.0, 0.0],
            "REPAIR_TYPE" => &[0.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            "MORT_30D" => &[1.0, 0.0, 1.0, 1.0, 0.0, 0.0]
        )
        .unwrap();

        let comparison = rupture_mortality(&df).unwrap();
        let evar = comparison.evar.unwrap();
        let open = comparison.open.unwrap();

        assert_eq!(evar.n, 2);
        assert!((evar.rate - 0.5).abs() < 1e-12);
        assert_eq!(open.n, 2);
        assert!((open.rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rupture_mortality_empty_arm() {
        let df = df!(
            "RUPTURED" => &[1.0, 1.0],
            "REPAIR_TYPE" => &[0.0, 0.0],
            "MORT_30D" => &[0.0, 1.0]
        )
        .unwrap();

        let comparison = rupture_mortality(&df).unwrap();
        assert!(comparison.evar.is_some());
        assert!(comparison.open.is_none());
    }

    #[test]
    fn test_rupture_mortality_missing_column() {
        let df = df!("RUPTURED" => &[1.0]).unwrap();
        assert!(matches!(
            rupture_mortality(&df),
            Err(PipelineError::MissingColumn(_))
        ));
    }
}
