// src/cli/check.rs
// Incremental check of one new requirement

use super::{AppContext, RunStatus, output_base, persist_outcome};
use anyhow::{Context, Result, bail};
use reqconflict::conflict::{DedupSet, WeightHistogram};
use reqconflict::table::{self, DEFAULT_RESULTS_STEM};
use std::path::{Path, PathBuf};

pub const CHECK_RESULTS_STEM: &str = "new_requirement_conflicts";

/// The file `check` compares against when none is given
pub fn default_against() -> PathBuf {
    PathBuf::from(format!("{}.csv", DEFAULT_RESULTS_STEM))
}

pub async fn run_check(
    ctx: &AppContext,
    requirement: &str,
    against: Option<&Path>,
    output: Option<PathBuf>,
    weights: Option<&WeightHistogram>,
) -> Result<RunStatus> {
    let requirement = requirement.trim();
    if requirement.is_empty() {
        bail!("The new requirement must not be empty");
    }

    let against = against.map(Path::to_path_buf).unwrap_or_else(default_against);
    if !against.exists() {
        bail!(
            "{} not found. Run `reqconflict predict` first or pass --against <file>",
            against.display()
        );
    }

    let existing = table::load_table(&against)
        .with_context(|| format!("Failed to load {}", against.display()))?
        .requirements();
    println!(
        "Checking against {} existing requirement(s) from {}",
        existing.len(),
        against.display()
    );

    let outcome = ctx
        .analyzer
        .run_incremental(requirement, &existing, &DedupSet::new(), weights)
        .await;

    let records = outcome.records();
    if records.is_empty() {
        println!("No conflicts found for the new requirement.");
    } else {
        println!("{} potential conflict(s):", records.len());
        for record in records {
            let other = if record.requirement_1 == requirement {
                &record.requirement_2
            } else {
                &record.requirement_1
            };
            println!("  [{}] {}: {}", record.conflict_type, other, record.conflict_reason);
        }
    }

    let base = output_base(output, CHECK_RESULTS_STEM);
    let (_, status) = persist_outcome(&outcome, &base)?;
    Ok(status)
}
