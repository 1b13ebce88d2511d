// src/cli/train.rs
// Pseudo-training command

use super::{AppContext, RunStatus, output_base, persist_records};
use anyhow::{Context, Result, bail};
use reqconflict::conflict::{PseudoTrainer, WeightHistogram, normalize_pair_rows};
use reqconflict::table::{self, InputTable};
use std::path::{Path, PathBuf};

pub const TRAINING_RESULTS_STEM: &str = "training_results";

/// Train and persist predictions plus the final weights. The weights are
/// returned so an interactive session can reuse them.
pub async fn run_train(
    ctx: &AppContext,
    file: &Path,
    iterations: usize,
    output: Option<PathBuf>,
) -> Result<(RunStatus, WeightHistogram)> {
    let input = table::load_table(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let InputTable::Paired(rows) = input else {
        bail!(
            "{} has no Requirement_1/Requirement_2 columns; training needs a labeled pairs table",
            file.display()
        );
    };

    let labeled = normalize_pair_rows(&rows);
    println!(
        "Training on {} labeled pair(s) for {} iteration(s)",
        labeled.len(),
        iterations
    );

    let outcome = PseudoTrainer::new(&ctx.analyzer)
        .train(&labeled, iterations)
        .await?;

    for report in &outcome.reports {
        println!(
            "Iteration {}: accuracy {:.2} ({}/{})",
            report.iteration, report.accuracy, report.correct, report.total
        );
    }

    if !outcome.weights.is_empty() {
        println!("Conflict type weights:");
        for (label, weight) in outcome.weights.ranked() {
            println!("  {:<28} {:.2}", label, weight);
        }
    }

    let base = output_base(output, TRAINING_RESULTS_STEM);
    let (_, status) = persist_records(&outcome.predictions, outcome.interrupted, &base)?;

    let weights_file = table::weights_path(&base);
    table::write_weights(&outcome.weights, &weights_file)
        .with_context(|| format!("Failed to write weights to {}", weights_file.display()))?;
    println!("Saved conflict type weights to {}", weights_file.display());

    Ok((status, outcome.weights))
}
