use crate::cli::output::*;
use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use vigil_core::{ColumnRole, Config, Dataframe};
use vigil_data::DataSource;

#[derive(Args)]
pub struct InspectArgs {
    /// Model id
    pub model: String,

    /// Number of latest rows to print (0 = schema only)
    #[arg(short, long, default_value = "5")]
    pub rows: usize,
}

pub fn run(args: InspectArgs, config: &Config) -> Result<()> {
    let ds = DataSource::from_config(config)?;
    let metadata = ds.get_metadata(&args.model)?;

    section_header(&format!("Model {}", args.model));
    let last_modified = ds
        .last_modified(&args.model)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "no row data".to_string());
    tree(&[
        ("Observations", format_number(metadata.observations)),
        (
            "Recorded inferences",
            if metadata.recorded_inferences { "yes" } else { "no" }.to_string(),
        ),
        (
            "Input tensor",
            metadata.input_tensor_name.clone().unwrap_or_else(|| "-".into()),
        ),
        (
            "Output tensor",
            metadata.output_tensor_name.clone().unwrap_or_else(|| "-".into()),
        ),
        ("Version", last_modified),
    ]);

    let mut columns = create_standard_table();
    columns.set_header(vec![
        header_cell("#"),
        header_cell("Column"),
        header_cell("Alias"),
        header_cell("Role"),
        header_cell("Type"),
        header_cell("Distinct values"),
    ]);
    let items = metadata
        .input_schema
        .ordered_items()
        .into_iter()
        .map(|item| (item, ColumnRole::Input, &metadata.input_schema))
        .chain(
            metadata
                .output_schema
                .ordered_items()
                .into_iter()
                .map(|item| (item, ColumnRole::Output, &metadata.output_schema)),
        );
    let mut items: Vec<_> = items.collect();
    items.sort_by_key(|(item, _, _)| item.index);
    for (item, role, schema) in items {
        let distinct = match &item.values {
            Some(values) => values.len().to_string(),
            None => "untracked".to_string(),
        };
        let role = match role {
            ColumnRole::Input => "input",
            ColumnRole::Output => "output",
        };
        columns.add_row(vec![
            Cell::new(item.index),
            Cell::new(&item.name),
            Cell::new(schema.name_mapping.get(&item.name).map_or("-", String::as_str)),
            Cell::new(role),
            Cell::new(item.column_type),
            Cell::new(distinct),
        ]);
    }
    println!("{}", columns);

    if args.rows == 0 {
        return Ok(());
    }

    let df = latest_rows(&ds, &args.model, args.rows)?;
    section_header(&format!("Latest {} row(s)", df.row_count()));
    if df.is_empty() {
        empty("No rows stored");
        return Ok(());
    }
    print_rows(&df);

    let tags = ds.get_tags(&args.model)?;
    if !tags.is_empty() {
        info(&format!(
            "Tags: {}",
            tags.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    Ok(())
}

/// Object stores cannot read a tail, so fall back to a full read there
fn latest_rows(ds: &DataSource, model_id: &str, n: usize) -> Result<Dataframe> {
    if ds.storage().backend.supports_partial_reads() {
        return Ok(ds.get_dataframe_batch(model_id, n)?);
    }
    let df = ds.get_dataframe(model_id)?;
    let skip = df.row_count().saturating_sub(n);
    let columns = df.columns().to_vec();
    let rows = df.into_rows().into_iter().skip(skip).collect();
    Ok(Dataframe::from_rows(columns, rows)?)
}

fn print_rows(df: &Dataframe) {
    let mut table = create_standard_table();
    let mut header = vec![header_cell("Id"), header_cell("Timestamp"), header_cell("Tags")];
    header.extend(df.columns().iter().map(|c| header_cell(c.display_name())));
    table.set_header(header);

    for row in df.rows() {
        let tags: Vec<&str> = row.tags.iter().map(String::as_str).collect();
        let mut cells = vec![
            Cell::new(truncate(&row.id, 24)),
            Cell::new(row.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(tags.join(", ")),
        ];
        cells.extend(row.values.iter().map(|v| Cell::new(truncate(&v.to_string(), 32))));
        table.add_row(cells);
    }
    println!("{}", table);
}
