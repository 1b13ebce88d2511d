// src/cli/predict.rs
// Batch prediction over a requirements file (exhaustive or baseline)

use super::{AppContext, RunStatus, output_base, persist_outcome, print_conflicts};
use anyhow::{Context, Result};
use reqconflict::conflict::{DedupSet, RequirementPair, WeightHistogram, normalize_pair_rows};
use reqconflict::table::{self, DEFAULT_RESULTS_STEM, InputTable};
use std::path::{Path, PathBuf};
use tracing::info;

pub const BASELINE_RESULTS_STEM: &str = "baseline_results";

/// Exhaustive mode for flat files; pre-paired files are evaluated as given
pub async fn run_predict(
    ctx: &AppContext,
    file: &Path,
    output: Option<PathBuf>,
    weights: Option<&WeightHistogram>,
) -> Result<RunStatus> {
    let input = table::load_table(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let dedup = DedupSet::new();
    info!(model = %ctx.config.inference.model, file = %file.display(), "Predicting conflicts");

    let outcome = match input {
        InputTable::Flat(requirements) => {
            println!(
                "Evaluating all pairs of {} requirement(s) from {}",
                requirements.len(),
                file.display()
            );
            ctx.analyzer.run_exhaustive(&requirements, &dedup, weights).await
        }
        InputTable::Paired(rows) => {
            let pairs: Vec<RequirementPair> = normalize_pair_rows(&rows)
                .into_iter()
                .map(|labeled| labeled.pair)
                .collect();
            println!("Evaluating {} pair(s) from {}", pairs.len(), file.display());
            info!(rows = rows.len(), pairs = pairs.len(), "Evaluating pre-paired table");
            ctx.analyzer.run_concurrent(pairs, &dedup, weights).await
        }
    };

    print_conflicts(outcome.records());
    let base = output_base(output, DEFAULT_RESULTS_STEM);
    let (_, status) = persist_outcome(&outcome, &base)?;
    Ok(status)
}

/// Baseline mode: first requirement against each of the others
pub async fn run_baseline(ctx: &AppContext, file: &Path, output: Option<PathBuf>) -> Result<RunStatus> {
    let input = table::load_table(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let requirements = input.requirements();
    if let Some(first) = requirements.first() {
        println!("Baseline requirement: {}", first);
    }

    let outcome = ctx.analyzer.run_baseline(&requirements, &DedupSet::new()).await;

    print_conflicts(outcome.records());
    let base = output_base(output, BASELINE_RESULTS_STEM);
    let (_, status) = persist_outcome(&outcome, &base)?;
    Ok(status)
}
