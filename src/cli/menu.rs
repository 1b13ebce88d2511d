// src/cli/menu.rs
// Interactive menu

use super::check::default_against;
use super::{AppContext, DEFAULT_ITERATIONS, RunStatus, run_check, run_predict, run_train};
use anyhow::Result;
use dialoguer::{Input, Select};
use reqconflict::conflict::WeightHistogram;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const MENU_ITEMS: &[&str] = &[
    "Predict conflicts in a requirements file",
    "Check a new requirement",
    "Train on a labeled pairs file",
    "Exit",
];

/// Show the menu until the user exits or a run is interrupted. Weights from
/// the latest training run are added to later predict and check prompts.
pub async fn run_menu(ctx: &AppContext) -> Result<RunStatus> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!(
            "The menu requires an interactive terminal.\n\
             Use a subcommand instead, e.g. `reqconflict predict <file>`."
        );
    }

    let mut last_weights: Option<WeightHistogram> = None;

    loop {
        if ctx.is_cancelled() {
            return Ok(RunStatus::Interrupted);
        }

        println!();
        let choice = blocking_prompt(|| {
            Ok(Select::new()
                .with_prompt("What would you like to do?")
                .items(MENU_ITEMS)
                .default(0)
                .interact()?)
        })
        .await?;

        let result = match choice {
            0 => {
                let file = blocking_prompt(|| prompt_existing_file("Requirements file (.csv or .xlsx)")).await?;
                run_predict(ctx, &file, None, last_weights.as_ref()).await
            }
            1 => {
                let requirement = blocking_prompt(prompt_requirement).await?;
                let against = blocking_prompt(prompt_against).await?;
                run_check(ctx, &requirement, Some(against.as_path()), None, last_weights.as_ref()).await
            }
            2 => {
                let file = blocking_prompt(|| prompt_existing_file("Labeled pairs file (.csv or .xlsx)")).await?;
                let iterations = blocking_prompt(prompt_iterations).await?;
                match run_train(ctx, &file, iterations, None).await {
                    Ok((status, weights)) => {
                        if !weights.is_empty() {
                            info!(labels = weights.len(), "Keeping training weights for later runs");
                            last_weights = Some(weights);
                        }
                        Ok(status)
                    }
                    Err(e) => Err(e),
                }
            }
            _ => {
                println!("Goodbye.");
                return Ok(RunStatus::Completed);
            }
        };

        match result {
            Ok(RunStatus::Interrupted) => return Ok(RunStatus::Interrupted),
            Ok(RunStatus::Completed) => {}
            Err(e) => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
            }
        }
    }
}

/// Run a terminal prompt on the blocking pool so runtime workers stay free
async fn blocking_prompt<T, F>(prompt: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt).await?
}

fn prompt_requirement() -> Result<String> {
    let requirement: String = Input::new()
        .with_prompt("New requirement")
        .validate_with(|text: &String| -> Result<(), &str> {
            if text.trim().is_empty() {
                Err("Please enter the requirement text")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(requirement)
}

fn prompt_existing_file(prompt: &str) -> Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            if Path::new(input.trim()).is_file() {
                Ok(())
            } else {
                Err("File not found")
            }
        })
        .interact_text()?;
    Ok(PathBuf::from(path.trim()))
}

/// Last results when present, otherwise ask for a file
fn prompt_against() -> Result<PathBuf> {
    let last = default_against();
    if last.is_file() {
        let label = format!("Last results ({})", last.display());
        let choice = Select::new()
            .with_prompt("Check against")
            .items(&[label.as_str(), "Another file"])
            .default(0)
            .interact()?;
        if choice == 0 {
            return Ok(last);
        }
    }
    prompt_existing_file("Requirements file to check against")
}

/// Re-asks until a whole number of at least 1 is entered
fn prompt_iterations() -> Result<usize> {
    let iterations = Input::<usize>::new()
        .with_prompt("Number of training iterations")
        .default(DEFAULT_ITERATIONS)
        .validate_with(|n: &usize| -> Result<(), &str> {
            if *n >= 1 {
                Ok(())
            } else {
                Err("Enter a number of at least 1")
            }
        })
        .interact_text()?;
    Ok(iterations)
}
