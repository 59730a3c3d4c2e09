//! Test fixtures and data generators

use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vigil_core::{Column, ColumnType, Dataframe, Row, Tensor, Value};

/// Builds dataframes with deterministic ids and timestamps
pub struct FrameBuilder {
    columns: Vec<Column>,
    rows: Vec<Row>,
    id_prefix: String,
}

impl FrameBuilder {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            id_prefix: "row".to_string(),
        }
    }

    pub fn id_prefix(mut self, prefix: &str) -> Self {
        self.id_prefix = prefix.to_string();
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.push(values, &[]);
        self
    }

    pub fn tagged_row(mut self, values: Vec<Value>, tags: &[&str]) -> Self {
        self.push(values, tags);
        self
    }

    fn push(&mut self, values: Vec<Value>, tags: &[&str]) {
        let index = self.rows.len();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
        let mut row = Row::new(values).with_id(format!("{}-{}", self.id_prefix, index));
        row.timestamp = base + Duration::seconds(index as i64);
        for tag in tags {
            row.tags.insert(tag.to_string());
        }
        self.rows.push(row);
    }

    pub fn build(self) -> Dataframe {
        Dataframe::from_rows(self.columns, self.rows).expect("fixture rows match fixture columns")
    }
}

fn numeric_columns() -> Vec<Column> {
    vec![
        Column::input("age", ColumnType::Number),
        Column::input("income", ColumnType::Number),
        Column::output("score", ColumnType::Number),
    ]
}

/// Three numeric columns (two inputs, one output), values derived from the row index
pub fn numeric_frame(rows: usize, id_prefix: &str) -> Dataframe {
    let mut builder = FrameBuilder::new(numeric_columns()).id_prefix(id_prefix);
    for i in 0..rows {
        builder = builder.row(vec![
            Value::Number(20.0 + i as f64),
            Value::Number(1000.0 * i as f64),
            Value::Number(i as f64 / 10.0),
        ]);
    }
    builder.build()
}

/// Same as `numeric_frame` plus a fourth input column
pub fn wide_numeric_frame(rows: usize, id_prefix: &str) -> Dataframe {
    let mut columns = numeric_columns();
    columns.insert(2, Column::input("tenure", ColumnType::Number));
    let mut builder = FrameBuilder::new(columns).id_prefix(id_prefix);
    for i in 0..rows {
        builder = builder.row(vec![
            Value::Number(20.0 + i as f64),
            Value::Number(1000.0 * i as f64),
            Value::Number(i as f64),
            Value::Number(i as f64 / 10.0),
        ]);
    }
    builder.build()
}

/// One categorical input drawn from `colours`, cycling, and a boolean output
pub fn colour_frame(colours: &[&str], id_prefix: &str) -> Dataframe {
    let mut builder = FrameBuilder::new(vec![
        Column::input("colour", ColumnType::Categorical),
        Column::output("approved", ColumnType::Boolean),
    ])
    .id_prefix(id_prefix);
    for (i, colour) in colours.iter().enumerate() {
        builder = builder.row(vec![
            Value::Categorical(colour.to_string()),
            Value::Boolean(i % 2 == 0),
        ]);
    }
    builder.build()
}

/// Every column type, with seeded random contents
pub fn mixed_type_frame(rows: usize, seed: u64) -> Dataframe {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = FrameBuilder::new(vec![
        Column::input("amount", ColumnType::Number),
        Column::input("member", ColumnType::Boolean),
        Column::input("segment", ColumnType::Categorical),
        Column::input("note", ColumnType::Text),
        Column::input("latency", ColumnType::Duration),
        Column::input("embedding", ColumnType::Tensor),
        Column::output("prediction", ColumnType::Number),
    ])
    .id_prefix("mixed");

    for _ in 0..rows {
        let embedding: Vec<f64> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
        builder = builder.row(vec![
            Value::Number(rng.gen_range(0.0..500.0)),
            Value::Boolean(rng.gen_bool(0.5)),
            Value::Categorical(format!("segment-{}", rng.gen_range(0..4))),
            Value::Text(format!("note with, commas and \"quotes\" {}", rng.gen::<u32>())),
            Value::Duration(rng.gen_range(0..10_000)),
            Value::Tensor(Tensor::new(vec![2, 2], embedding)),
            Value::Number(rng.gen_range(0.0..1.0)),
        ]);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shapes() {
        let df = numeric_frame(10, "a");
        assert_eq!(df.row_count(), 10);
        assert_eq!(df.column_count(), 3);
        assert_eq!(df.rows()[3].id, "a-3");

        assert_eq!(wide_numeric_frame(2, "w").column_count(), 4);
        assert_eq!(mixed_type_frame(5, 7), mixed_type_frame(5, 7));
    }
}
