//! Multi-outcome training and evaluation engine for abdominal aortic
//! aneurysm (AAA) repair outcome prediction.
//!
//! Given a tabular cohort of repair procedures, the pipeline trains and
//! evaluates five binary-classifier families against fourteen adverse
//! outcomes and reports discrimination, calibration, cross-outcome
//! summaries and clinical-subgroup breakdowns.
//!
//! # Modules
//!
//! ## Pipeline core
//! - [`pipeline`] - Per-outcome orchestration and result records
//! - [`search`] - Cross-validated hyperparameter grid search
//! - [`models`] - The five classifier families and their search spaces
//!
//! ## Data handling
//! - [`registry`] - Outcome set and predictor tiers (fixed configuration)
//! - [`dataset`] - Cohort assembly and median imputation
//! - [`split`] - Stratified holdout and k-fold partitioning
//! - [`sampling`] - Minority oversampling for the training partition
//! - [`scaling`] - Standardization for scale-sensitive families
//!
//! ## Measurement
//! - [`metrics`] - ROC AUC and Brier score
//! - [`subgroup`] - Clinical subgroup re-evaluation
//!
//! ## Glue
//! - [`report`] - Plain-text rendering of results

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod sampling;
pub mod scaling;
pub mod search;
pub mod split;
pub mod subgroup;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dataset::{Cohort, ImputePolicy, MedianImputer};
    pub use crate::error::{PipelineError, Result};
    pub use crate::metrics::{brier_score, prevalence, roc_auc};
    pub use crate::models::{
        default_grids, FamilyGrid, FamilyParams, ModelFamily, TrainedClassifier,
    };
    pub use crate::pipeline::{
        run, run_outcome, FamilyOutcome, FamilyReport, OutcomeResult, OutcomeStatus,
        PipelineConfig, PipelineReport, SummaryRecord,
    };
    pub use crate::registry::{predictor_columns, OutcomeSpec, PredictorTier, OUTCOMES};
    pub use crate::sampling::MinorityOversampler;
    pub use crate::scaling::StandardScaler;
    pub use crate::search::{grid_search, SearchConfig, SearchOutcome};
    pub use crate::split::{stratified_k_fold, stratified_split};
    pub use crate::subgroup::{analyze_subgroups, SubgroupScore, SubgroupSpec};
}
