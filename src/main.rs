//! CLI entry point
//!
//! Thin glue: load the cohort CSV, run the pipeline, print the report.
//! All analysis lives in the library.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use aortic_outcomes::dataset::ImputePolicy;
use aortic_outcomes::pipeline::{run, PipelineConfig};
use aortic_outcomes::registry::PredictorTier;
use aortic_outcomes::report;
use clap::Parser;
use polars::prelude::*;

#[derive(Parser)]
#[command(
    name = "aortic-outcomes",
    version,
    about = "Train and evaluate outcome models for AAA repair cohorts"
)]
struct Cli {
    /// Cohort CSV with outcome and predictor columns
    data: PathBuf,

    /// Base random seed (fixes splits, sampling and model fits)
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Held-out test fraction
    #[arg(long, default_value_t = 0.30)]
    test_fraction: f64,

    /// Predictor tier: preop, intraop or postop
    #[arg(long, default_value = "preop")]
    tier: String,

    /// Imputation statistics: full-cohort (faithful) or train-only (corrected)
    #[arg(long, default_value = "full-cohort")]
    impute: String,

    /// Cap on evaluated grid candidates per family
    #[arg(long)]
    max_candidates: Option<usize>,

    /// Write the structured results as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aortic_outcomes=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let tier = match cli.tier.as_str() {
        "preop" => PredictorTier::Preop,
        "intraop" => PredictorTier::Intraop,
        "postop" => PredictorTier::Postop,
        other => anyhow::bail!("unknown predictor tier: {}", other),
    };
    let impute = match cli.impute.as_str() {
        "full-cohort" => ImputePolicy::FullCohort,
        "train-only" => ImputePolicy::TrainOnly,
        other => anyhow::bail!("unknown impute policy: {}", other),
    };

    let file = File::open(&cli.data)
        .with_context(|| format!("opening cohort file {}", cli.data.display()))?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .context("parsing cohort CSV")?;

    let config = PipelineConfig {
        seed: cli.seed,
        test_fraction: cli.test_fraction,
        tier,
        impute,
        max_candidates: cli.max_candidates,
        ..Default::default()
    };

    let results = run(&df, &config)?;

    if let Some(path) = &cli.json {
        std::fs::write(path, serde_json::to_string_pretty(&results)?)
            .with_context(|| format!("writing results to {}", path.display()))?;
    }

    print!("{}", report::render(&results));
    Ok(())
}
