use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::{Cli, Commands};
use vigil_core::VigilError;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins, then VIGIL_LOG, then the -v count
    let default_filter = log_level(std::env::var("VIGIL_LOG").ok(), cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        let exit_code = match e.downcast_ref::<VigilError>() {
            Some(VigilError::Configuration(_)) => 2,
            Some(VigilError::Io(_)) => 3,
            Some(VigilError::Read(_)) | Some(VigilError::NotFound(_)) => 4,
            Some(VigilError::Write(_)) => 5,
            Some(VigilError::InvalidSchema(_)) | Some(VigilError::IllegalArgument(_)) => 6,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn log_level(vigil_log: Option<String>, verbose: u8) -> String {
    match (vigil_log, verbose) {
        (Some(filter), _) => filter,
        (None, 0) => "warn".to_string(),
        (None, 1) => "info".to_string(),
        (None, _) => "debug".to_string(),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Models(args) => crate::cli::commands::models::run(args, &config),
        Commands::Inspect(args) => crate::cli::commands::inspect::run(args, &config),
        Commands::Migrate(args) => crate::cli::commands::migrate::run(args, &config),
    }
}
