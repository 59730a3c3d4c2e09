use crate::cli::output::*;
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::Cell;
use std::path::PathBuf;
use vigil_core::{Config, StorageFormat};
use vigil_data::{DataSource, Migrator};

#[derive(Args)]
pub struct MigrateArgs {
    /// Legacy local-file folder (overrides `migration.from_folder`)
    #[arg(long, value_name = "FOLDER")]
    pub from: Option<PathBuf>,

    /// Parallel model copies (0 = one per CPU)
    #[arg(short = 'j', long, default_value = "0")]
    pub threads: usize,
}

pub fn run(args: MigrateArgs, config: &Config) -> Result<()> {
    let mut migration = config.migration.clone();
    if let Some(from) = args.from {
        migration.from_folder = Some(from);
    }
    let Some(folder) = migration.from_folder.clone() else {
        warning("No migration source configured; set migration.from_folder or pass --from");
        return Ok(());
    };

    if config.storage.format == StorageFormat::Memory {
        warning("Target storage is in memory; migrated data will not outlive this process");
    }

    let migrator = Migrator::new(DataSource::from_config(config)?).with_threads(args.threads);
    action(&format!(
        "Migrating {} into {} storage",
        folder.display(),
        migrator.native().storage().name()
    ));

    let Some(summary) = migrator.migrate_from_config(&migration)? else {
        warning(&format!("{} does not exist, nothing migrated", folder.display()));
        return Ok(());
    };

    if summary.migrated.is_empty() && summary.failed.is_empty() {
        empty("No models found in the source folder");
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Model"),
        header_cell("Rows"),
        header_cell("Batches"),
    ]);
    for report in &summary.migrated {
        table.add_row(vec![
            Cell::new(&report.model_id),
            Cell::new(format_number(report.rows as u64)),
            Cell::new(report.batches),
        ]);
    }
    println!("{}", table);

    for (model_id, reason) in &summary.failed {
        error(&format!("{}: {}", model_id, reason));
    }
    if !summary.is_complete() {
        bail!(
            "{} of {} models failed to migrate",
            summary.failed.len(),
            summary.failed.len() + summary.migrated.len()
        );
    }

    success(&format!(
        "Migrated {} model(s), {} rows",
        summary.migrated.len(),
        format_number(summary.total_rows() as u64)
    ));
    Ok(())
}
