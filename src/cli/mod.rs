// src/cli/mod.rs
// CLI module for reqconflict commands

use anyhow::{Context, Result, bail};
use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use reqconflict::config::EnvConfig;
use reqconflict::conflict::{Analyzer, ConflictRecord, RunOutcome, WeightHistogram};
use reqconflict::llm::{CachedInference, InferenceClient};
use reqconflict::table::{self, OutputPaths};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod check;
pub mod menu;
pub mod predict;
pub mod train;

pub use check::run_check;
pub use menu::run_menu;
pub use predict::{run_baseline, run_predict};
pub use train::run_train;

/// Exit status used when a run was interrupted with Ctrl-C
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

pub const DEFAULT_ITERATIONS: usize = 3;

#[derive(Parser)]
#[command(name = "reqconflict")]
#[command(about = "Detect conflicts between product requirements with an LLM")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate every requirement pair in a file
    Predict {
        /// CSV or spreadsheet with a Requirements column, or Requirement_1/Requirement_2
        file: PathBuf,

        /// Output base path (.csv and .xlsx are written)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conflict-type weights saved by `train`, added to every prompt
        #[arg(short, long)]
        weights: Option<PathBuf>,
    },

    /// Check one new requirement against existing ones
    Check {
        /// Text of the new requirement
        requirement: String,

        /// Requirements file to check against (default: last results)
        #[arg(short, long)]
        against: Option<PathBuf>,

        /// Output base path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conflict-type weights saved by `train`, added to every prompt
        #[arg(short, long)]
        weights: Option<PathBuf>,
    },

    /// Run labeled passes that feed a conflict-type weight hint back into prompts
    Train {
        /// Pairs file with Requirement_1, Requirement_2 and Conflict_Type columns
        file: PathBuf,

        /// Number of passes
        #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS,
              value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
        iterations: usize,

        /// Output base path (weights go to `<base>_weights.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare the first requirement against each of the others
    Baseline {
        file: PathBuf,

        /// Output base path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration and validation report
    Config,

    /// Interactive menu (default)
    Menu,
}

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Completed => ExitCode::SUCCESS,
            Self::Interrupted => ExitCode::from(INTERRUPTED_EXIT_CODE),
        }
    }
}

/// Shared state for commands that call the inference endpoint
pub struct AppContext {
    pub config: EnvConfig,
    pub analyzer: Analyzer,
}

impl AppContext {
    /// Load configuration and wire transport, client, cache and analyzer.
    /// Fails when no API key is configured.
    pub fn build(cancel: CancellationToken) -> Result<Self> {
        let config = EnvConfig::load();
        let validation = config.validate();
        for warning in &validation.warnings {
            warn!("{}", warning);
        }
        if !validation.is_valid() {
            bail!("Invalid configuration:\n{}", validation.report());
        }

        let api_key = config.api_keys.require_gemini()?;
        let client = InferenceClient::gemini(api_key, &config.inference);
        let inference = Arc::new(CachedInference::with_capacity(
            client,
            config.analysis.cache_capacity,
        ));

        info!(
            model = %config.inference.model,
            workers = config.analysis.workers,
            max_in_flight = config.analysis.max_in_flight,
            "Analyzer ready"
        );

        let analyzer = Analyzer::new(inference, config.analysis.clone(), cancel);
        Ok(Self { config, analyzer })
    }

    pub fn is_cancelled(&self) -> bool {
        self.analyzer.cancel_token().is_cancelled()
    }
}

/// Cancel `cancel` on the first Ctrl-C
pub fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, finishing in-flight requests...");
            warn!("Ctrl-C received, cancelling run");
            cancel.cancel();
        }
    });
}

/// Write completed results to `base`, or interrupted ones to a timestamped
/// partial file next to it.
pub fn persist_outcome(outcome: &RunOutcome, base: &Path) -> Result<(OutputPaths, RunStatus)> {
    persist_records(outcome.records(), outcome.is_interrupted(), base)
}

pub fn persist_records(
    records: &[ConflictRecord],
    interrupted: bool,
    base: &Path,
) -> Result<(OutputPaths, RunStatus)> {
    if interrupted {
        let paths = table::write_partial_results(records, base)
            .with_context(|| format!("Failed to save partial results next to {}", base.display()))?;
        println!(
            "Interrupted. Saved {} partial result(s) to {} and {}",
            records.len(),
            paths.csv.display(),
            paths.xlsx.display()
        );
        Ok((paths, RunStatus::Interrupted))
    } else {
        let paths = table::write_results(records, base)
            .with_context(|| format!("Failed to write results to {}", base.display()))?;
        println!(
            "Saved {} result(s) to {} and {}",
            records.len(),
            paths.csv.display(),
            paths.xlsx.display()
        );
        Ok((paths, RunStatus::Completed))
    }
}

/// One line per record that reports an actual conflict
pub fn print_conflicts(records: &[ConflictRecord]) {
    let conflicts: Vec<&ConflictRecord> = records.iter().filter(|r| r.is_conflict()).collect();
    let unknown = records.iter().filter(|r| r.is_unknown()).count();
    println!(
        "{} pair(s) evaluated: {} conflict(s), {} need manual review",
        records.len(),
        conflicts.len(),
        unknown
    );
    for record in conflicts {
        println!(
            "  [{}] \"{}\" <-> \"{}\": {}",
            record.conflict_type, record.requirement_1, record.requirement_2, record.conflict_reason
        );
    }
}

/// Print the effective configuration and its validation report
pub fn run_config() -> Result<RunStatus> {
    let config = EnvConfig::load();
    let key_status = if config.api_keys.gemini.is_some() {
        "set"
    } else {
        "missing"
    };

    println!("Config file:     {}", reqconflict::config::FileConfig::config_path().display());
    println!("API key:         {}", key_status);
    println!("Endpoint:        {}", config.inference.endpoint);
    println!("Model:           {}", config.inference.model);
    println!("Max retries:     {}", config.inference.max_retries);
    println!("Backoff:         {:?}", config.inference.base_backoff);
    println!("Timeout:         {:?}", config.inference.timeout);
    println!("Workers:         {}", config.analysis.workers);
    println!("Max in flight:   {}", config.analysis.max_in_flight);
    println!("Request delay:   {:?}", config.analysis.request_delay);
    println!("Cache capacity:  {}", config.analysis.cache_capacity);
    println!();
    println!("{}", config.validate().report());
    Ok(RunStatus::Completed)
}

/// Load the `--weights` file when one was given
pub fn load_weights_arg(path: Option<&Path>) -> Result<Option<WeightHistogram>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let weights = table::load_weights(path)
        .with_context(|| format!("Failed to load weights from {}", path.display()))?;
    println!("Using {} conflict type weight(s) from {}", weights.len(), path.display());
    Ok(Some(weights))
}

/// Default output base for a command
pub fn output_base(output: Option<PathBuf>, default_stem: &str) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(default_stem))
}
