//! Plain-text rendering of pipeline results
//!
//! Thin presentation glue: everything here reads the structured report and
//! pushes formatted lines. No analysis happens in this module.

use crate::pipeline::{FamilyOutcome, OutcomeResult, OutcomeStatus, PipelineReport};

/// Render the full run as a text report
pub fn render(report: &PipelineReport) -> String {
    let mut out = String::new();
    out.push_str("=== AAA Repair Outcome Prediction Report ===\n\n");

    for outcome in &report.outcomes {
        render_outcome(&mut out, outcome);
    }

    render_summary_table(&mut out, report);
    render_rupture(&mut out, report);

    out
}

fn render_outcome(out: &mut String, outcome: &OutcomeResult) {
    out.push_str(&format!(
        "--- {} ({}) ---\n",
        outcome.spec.label, outcome.spec.column
    ));

    if let OutcomeStatus::Skipped { reason } = &outcome.status {
        out.push_str(&format!("  skipped: {}\n\n", reason));
        return;
    }

    out.push_str(&format!(
        "  cohort: {} rows, prevalence {:.3}, train {} / test {}\n",
        outcome.n_cohort, outcome.cohort_prevalence, outcome.n_train, outcome.n_test
    ));

    for family in &outcome.families {
        match &family.outcome {
            FamilyOutcome::Trained(eval) => out.push_str(&format!(
                "  {:<18} AUC {:.4}  Brier {:.4}  (cv {:.4})  [{}]\n",
                family.family.name(),
                eval.test_auc,
                eval.brier,
                eval.cv_auc,
                eval.params
            )),
            FamilyOutcome::Failed { reason } => out.push_str(&format!(
                "  {:<18} failed: {}\n",
                family.family.name(),
                reason
            )),
        }
    }

    if let Some(summary) = &outcome.summary {
        out.push_str(&format!(
            "  best: {} (AUC {:.4})",
            summary.best_family.name(),
            summary.best_auc
        ));
        if let (Some(baseline), Some(delta)) = (summary.baseline_auc, summary.improvement) {
            out.push_str(&format!(
                "  vs logistic {:.4}  (+{:.4})",
                baseline, delta
            ));
        }
        out.push('\n');
    }

    if !outcome.subgroups.is_empty() {
        out.push_str("  subgroups:\n");
        for score in &outcome.subgroups {
            match score.auc {
                Some(auc) => out.push_str(&format!(
                    "    {:<24} n={:<6} AUC {:.4}\n",
                    score.name, score.n, auc
                )),
                None => out.push_str(&format!(
                    "    {:<24} n={:<6} insufficient sample size\n",
                    score.name, score.n
                )),
            }
        }
    }
    out.push('\n');
}

fn render_summary_table(out: &mut String, report: &PipelineReport) {
    out.push_str("--- Cross-outcome summary ---\n");
    out.push_str(&format!(
        "{:<40} {:<18} {:>8} {:>10} {:>8}\n",
        "outcome", "best family", "AUC", "baseline", "delta"
    ));

    for outcome in &report.outcomes {
        match (&outcome.status, &outcome.summary) {
            (OutcomeStatus::Complete, Some(summary)) => {
                out.push_str(&format!(
                    "{:<40} {:<18} {:>8.4} {:>10} {:>8}\n",
                    outcome.spec.label,
                    summary.best_family.name(),
                    summary.best_auc,
                    summary
                        .baseline_auc
                        .map_or("-".to_string(), |v| format!("{:.4}", v)),
                    summary
                        .improvement
                        .map_or("-".to_string(), |v| format!("{:+.4}", v)),
                ));
            }
            _ => {
                out.push_str(&format!("{:<40} skipped\n", outcome.spec.label));
            }
        }
    }
    out.push('\n');
}

fn render_rupture(out: &mut String, report: &PipelineReport) {
    out.push_str("--- Ruptured AAA: 30-day mortality by repair type ---\n");
    match &report.rupture {
        Some(comparison) => {
            for (name, arm) in [("EVAR", &comparison.evar), ("OPEN", &comparison.open)] {
                match arm {
                    Some(m) => out.push_str(&format!(
                        "  {:<5} {:>5}/{:<5} = {:.1}%\n",
                        name,
                        m.deaths,
                        m.n,
                        m.rate * 100.0
                    )),
                    None => out.push_str(&format!("  {:<5} no cases\n", name)),
                }
            }
        }
        None => out.push_str("  not available\n"),
    }
}
