// src/main.rs
// reqconflict - LLM-assisted requirement conflict detection

use anyhow::Result;
use clap::Parser;
use reqconflict::config::file::config_dir;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{AppContext, Cli, Commands, RunStatus};

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => std::env::var("REQCONFLICT_LOG")
            .ok()
            .and_then(|level| level.parse().ok())
            .unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

async fn run(cli: Cli) -> Result<RunStatus> {
    let command = cli.command.unwrap_or(Commands::Menu);
    if let Commands::Config = command {
        return cli::run_config();
    }

    let cancel = CancellationToken::new();
    let ctx = AppContext::build(cancel.clone())?;
    cli::spawn_interrupt_watcher(cancel);

    match command {
        Commands::Predict { file, output, weights } => {
            let weights = cli::load_weights_arg(weights.as_deref())?;
            cli::run_predict(&ctx, &file, output, weights.as_ref()).await
        }
        Commands::Check {
            requirement,
            against,
            output,
            weights,
        } => {
            let weights = cli::load_weights_arg(weights.as_deref())?;
            cli::run_check(&ctx, &requirement, against.as_deref(), output, weights.as_ref()).await
        }
        Commands::Train {
            file,
            iterations,
            output,
        } => cli::run_train(&ctx, &file, iterations, output)
            .await
            .map(|(status, _)| status),
        Commands::Baseline { file, output } => cli::run_baseline(&ctx, &file, output).await,
        Commands::Menu => cli::run_menu(&ctx).await,
        Commands::Config => cli::run_config(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env files (global first, then current directory)
    let _ = dotenvy::from_path(config_dir().join(".env"));
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    match run(cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
