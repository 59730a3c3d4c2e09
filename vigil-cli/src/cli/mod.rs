pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use vigil_core::{Config, VigilResult};

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "Inspect and migrate stored model inference data",
    long_about = "Vigil stores inference dataframes and their schema metadata behind memory, \
                  local-file, object-store or relational backends. This tool lists stored \
                  models, inspects their schema and latest rows, and copies models out of a \
                  legacy local-file store."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE", env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List models with stored metadata
    Models(commands::models::ModelsArgs),

    /// Show the schema and latest rows of a model
    Inspect(commands::inspect::InspectArgs),

    /// Copy every model from a legacy local-file folder into the configured storage
    Migrate(commands::migrate::MigrateArgs),
}

/// The configuration at `path`, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> VigilResult<Config> {
    match path {
        Some(path) => {
            let config = vigil_core::load_config(path)?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
