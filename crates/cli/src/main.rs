//! Prediction Service CLI
//!
//! A command-line client for requesting predictions from the service and
//! sending labelled batches to retrain its model.

mod client;
mod commands;
mod config;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{info, predict, retrain};
use std::path::PathBuf;
use std::process::ExitCode;

/// Prediction Service CLI
#[derive(Parser)]
#[command(name = "predictctl")]
#[command(author, version, about = "CLI for the Prediction Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via PREDICT_API_URL env var)
    #[arg(long, env = "PREDICT_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the service greeting
    Info,

    /// Predict outputs for one feature vector
    Predict {
        /// Comma-separated feature values, e.g. 1.0,2.0,3.0
        #[arg(allow_hyphen_values = true)]
        values: String,
    },

    /// Retrain the model on labelled rows
    Retrain {
        /// Comma-separated feature row (repeat for each row)
        #[arg(long = "row", allow_hyphen_values = true, conflicts_with = "file")]
        rows: Vec<String>,

        /// File with one comma-separated row per line
        #[arg(long)]
        file: Option<PathBuf>,

        /// Comma-separated labels, one per row
        #[arg(long, allow_hyphen_values = true)]
        labels: String,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url);
    let format = config.resolve_format(cli.format);

    let client = client::ApiClient::new(&api_url)?;
    if cli.verbose {
        output::print_info(&format!("Using API at {}", client.base_url()));
    }

    match cli.command {
        Commands::Info => {
            info::show_info(&client, format).await?;
        }
        Commands::Predict { values } => {
            predict::run_predict(&client, &values, format).await?;
        }
        Commands::Retrain {
            rows,
            file,
            labels,
        } => {
            retrain::run_retrain(&client, &rows, file.as_deref(), &labels, format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(input_error) = err.downcast_ref::<input::InputError>() {
                output::print_warning(&format!("Invalid input: {}", input_error));
                return ExitCode::from(2);
            }
            if let Some(api_error) = err.downcast_ref::<client::ApiError>() {
                if api_error.is_client_error() {
                    output::print_warning(&api_error.detail);
                } else {
                    output::print_error(&api_error.detail);
                }
                return ExitCode::FAILURE;
            }
            output::print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
