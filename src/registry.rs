//! Outcome and predictor configuration
//!
//! The outcome set and predictor tiers are fixed study configuration, not
//! derived from data. Predictor tiers are layered: each tier is the previous
//! tier plus additional columns.

use serde::{Deserialize, Serialize};

/// Column carrying the repair approach (0 = EVAR, 1 = OPEN after encoding)
pub const REPAIR_TYPE: &str = "REPAIR_TYPE";
/// Column flagging ruptured presentation (binary)
pub const RUPTURED: &str = "RUPTURED";

/// Numeric code assigned to endovascular repair
pub const REPAIR_CODE_EVAR: f64 = 0.0;
/// Numeric code assigned to open repair
pub const REPAIR_CODE_OPEN: f64 = 1.0;

/// One prediction target: dataset column plus a human-readable label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeSpec {
    pub column: &'static str,
    pub label: &'static str,
}

/// The fourteen perioperative and long-term endpoints modelled by the study
pub const OUTCOMES: [OutcomeSpec; 14] = [
    OutcomeSpec { column: "MORT_30D", label: "30-day mortality" },
    OutcomeSpec { column: "MORT_1YR", label: "1-year mortality" },
    OutcomeSpec { column: "MORT_5YR", label: "5-year mortality" },
    OutcomeSpec { column: "POSTOP_AMI", label: "Postoperative myocardial infarction" },
    OutcomeSpec { column: "POSTOP_STROKE", label: "Postoperative stroke" },
    OutcomeSpec { column: "POSTOP_RENAL", label: "Postoperative renal failure" },
    OutcomeSpec { column: "POSTOP_RESP", label: "Postoperative respiratory failure" },
    OutcomeSpec { column: "POSTOP_BOWEL_ISCHEMIA", label: "Postoperative bowel ischemia" },
    OutcomeSpec { column: "POSTOP_LEG_ISCHEMIA", label: "Postoperative leg ischemia" },
    OutcomeSpec { column: "POSTOP_SSI", label: "Surgical site infection" },
    OutcomeSpec { column: "REINTERVENTION_30D", label: "30-day reintervention" },
    OutcomeSpec { column: "REINTERVENTION_LATE", label: "Late reintervention" },
    OutcomeSpec { column: "ENDOLEAK_1YR", label: "Endoleak at one year" },
    OutcomeSpec { column: "PROLONGED_LOS", label: "Prolonged length of stay" },
];

/// Predictor availability tier.
///
/// `Preop` is what a clinician knows before the incision; `Intraop` adds
/// operative variables; `Postop` adds early postoperative course. The
/// orchestrator defaults to `Preop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictorTier {
    #[default]
    Preop,
    Intraop,
    Postop,
}

/// Demographics, comorbidity, anatomy and presentation known preoperatively
const PREOP_PREDICTORS: &[&str] = &[
    "AGE",
    "SEX_FEMALE",
    "BMI",
    "SMOKING",
    "HYPERTENSION",
    "DIABETES",
    "CAD",
    "PRIOR_MI",
    "CHF",
    "COPD",
    "CKD_STAGE",
    "DIALYSIS",
    "PRIOR_STROKE",
    "AFIB",
    "PAD",
    "STATIN",
    "BETA_BLOCKER",
    "ANTIPLATELET",
    "ANTICOAGULANT",
    "PREOP_CREATININE",
    "PREOP_HEMOGLOBIN",
    "AAA_DIAMETER",
    "NECK_LENGTH",
    "NECK_DIAMETER",
    "NECK_ANGULATION",
    "ILIAC_INVOLVEMENT",
    "PRIOR_AORTIC_SURGERY",
    "FUNCTIONAL_STATUS",
    "ELECTIVE",
    "TRANSFER",
    RUPTURED,
    REPAIR_TYPE,
];

/// Operative variables, available once the case is underway
const INTRAOP_PREDICTORS: &[&str] = &[
    "ANESTHESIA_GENERAL",
    "OR_TIME_MIN",
    "EBL_ML",
    "TRANSFUSION_UNITS",
    "CLAMP_SUPRARENAL",
    "GRAFT_CONFIG",
    "CONVERSION_TO_OPEN",
    "INTRAOP_HYPOTENSION",
    "CONTRAST_VOLUME_ML",
];

/// Early postoperative course
const POSTOP_PREDICTORS: &[&str] = &[
    "ICU_LOS_DAYS",
    "VENT_HOURS",
    "PEAK_POSTOP_CREATININE",
    "POSTOP_TROPONIN_ELEVATED",
    "RETURN_TO_OR",
    "DISCHARGE_NOT_HOME",
];

/// Ordered, deduplicated predictor list for a tier.
///
/// Layering invariant: `preop ⊆ intraop ⊆ postop`, with tier-specific
/// columns appended in declaration order.
pub fn predictor_columns(tier: PredictorTier) -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = Vec::new();
    let mut push_all = |extra: &[&'static str]| {
        for &col in extra {
            if !cols.contains(&col) {
                cols.push(col);
            }
        }
    };

    push_all(PREOP_PREDICTORS);
    if matches!(tier, PredictorTier::Intraop | PredictorTier::Postop) {
        push_all(INTRAOP_PREDICTORS);
    }
    if matches!(tier, PredictorTier::Postop) {
        push_all(POSTOP_PREDICTORS);
    }
    cols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourteen_outcomes() {
        assert_eq!(OUTCOMES.len(), 14);
        let mut cols: Vec<&str> = OUTCOMES.iter().map(|o| o.column).collect();
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(cols.len(), 14, "outcome columns must be unique");
    }

    #[test]
    fn test_tiers_are_layered() {
        let preop = predictor_columns(PredictorTier::Preop);
        let intraop = predictor_columns(PredictorTier::Intraop);
        let postop = predictor_columns(PredictorTier::Postop);

        assert!(preop.len() >= 30, "preop tier should carry ~30+ predictors");
        for col in &preop {
            assert!(intraop.contains(col), "{} missing from intraop tier", col);
        }
        for col in &intraop {
            assert!(postop.contains(col), "{} missing from postop tier", col);
        }
        assert!(intraop.len() > preop.len());
        assert!(postop.len() > intraop.len());
    }

    #[test]
    fn test_predictors_deduplicated() {
        for tier in [PredictorTier::Preop, PredictorTier::Intraop, PredictorTier::Postop] {
            let cols = predictor_columns(tier);
            let mut sorted = cols.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), cols.len());
        }
    }

    #[test]
    fn test_preop_includes_comparison_drivers() {
        let preop = predictor_columns(PredictorTier::Preop);
        assert!(preop.contains(&REPAIR_TYPE));
        assert!(preop.contains(&RUPTURED));
    }
}
