use crate::cli::output::*;
use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use vigil_core::Config;
use vigil_data::DataSource;
use vigil_storage::keys::data_key;

#[derive(Args)]
pub struct ModelsArgs {
    /// Only list models whose row data is also present
    #[arg(long)]
    pub verified: bool,
}

pub fn run(args: ModelsArgs, config: &Config) -> Result<()> {
    let ds = DataSource::from_config(config)?;
    let storage = ds.storage();

    let mut models = storage.metadata.list_models()?;
    if args.verified {
        models.retain(|model_id| storage.backend.exists(&data_key(model_id)));
    }
    models.sort();

    section_header(&format!("Models in {} storage", storage.name()));
    if models.is_empty() {
        empty("No models found");
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Model"),
        header_cell("Observations"),
        header_cell("Inputs"),
        header_cell("Outputs"),
        header_cell("Unlabeled"),
    ]);

    for model_id in &models {
        match storage.metadata.get(model_id, false) {
            Ok(metadata) => {
                table.add_row(vec![
                    Cell::new(model_id),
                    Cell::new(format_number(metadata.observations)),
                    Cell::new(metadata.input_schema.len()),
                    Cell::new(metadata.output_schema.len()),
                    Cell::new(if metadata.recorded_inferences { "yes" } else { "no" }),
                ]);
            }
            Err(e) => error(&format!("{}: {}", model_id, e)),
        }
    }
    println!("{}", table);
    info(&format!("{} model(s)", models.len()));
    Ok(())
}
