//! Row-major inference tables

use super::tagging::{DataTagging, SYNTHETIC_TAG, UNLABELED_TAG};
use super::value::{ColumnType, Domain, Value};
use crate::{VigilError, VigilResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub role: ColumnRole,
    #[serde(default)]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Column {
    pub fn input(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnRole::Input)
    }

    pub fn output(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::new(name, column_type, ColumnRole::Output)
    }

    pub fn new(name: impl Into<String>, column_type: ColumnType, role: ColumnRole) -> Self {
        Self {
            name: name.into(),
            column_type,
            role,
            domain: None,
            alias: None,
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Alias if one is set, else the original name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub tags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Value>,
}

impl Row {
    /// New row with a fresh UUID and the current time
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tags: BTreeSet::new(),
            timestamp: Utc::now(),
            values,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Neither synthetic nor unlabeled
    pub fn is_organic(&self) -> bool {
        !self.tags.contains(SYNTHETIC_TAG) && !self.tags.contains(UNLABELED_TAG)
    }
}

/// An ordered table of inference records
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataframe {
    columns: Vec<Column>,
    rows: Vec<Row>,
    #[serde(default)]
    input_tensor_name: Option<String>,
    #[serde(default)]
    output_tensor_name: Option<String>,
}

impl Dataframe {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Build a dataframe, validating every row against the columns
    pub fn from_rows(columns: Vec<Column>, rows: Vec<Row>) -> VigilResult<Self> {
        let mut df = Self::new(columns);
        df.rows.reserve(rows.len());
        for row in rows {
            df.push_row(row)?;
        }
        Ok(df)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn input_indices(&self) -> Vec<usize> {
        self.indices_with_role(ColumnRole::Input)
    }

    pub fn output_indices(&self) -> Vec<usize> {
        self.indices_with_role(ColumnRole::Output)
    }

    fn indices_with_role(&self, role: ColumnRole) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.role == role)
            .map(|(i, _)| i)
            .collect()
    }

    /// Append a row. Cell count and per-column types are checked.
    pub fn push_row(&mut self, row: Row) -> VigilResult<()> {
        if row.values.len() != self.columns.len() {
            return Err(VigilError::IllegalArgument(format!(
                "Row {} has {} cells but the dataframe has {} columns",
                row.id,
                row.values.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&row.values) {
            if value.column_type() != column.column_type {
                return Err(VigilError::IllegalArgument(format!(
                    "Column {} expects {} but row {} holds {}",
                    column.name,
                    column.column_type,
                    row.id,
                    value.column_type()
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a new row built from bare values
    pub fn push_values(&mut self, values: Vec<Value>) -> VigilResult<()> {
        self.push_row(Row::new(values))
    }

    /// Column values in row order
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |r| r.values.get(index))
    }

    pub fn row_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.id.as_str()).collect()
    }

    /// Distinct tags across all rows
    pub fn tags(&self) -> BTreeSet<String> {
        self.rows.iter().flat_map(|r| r.tags.iter().cloned()).collect()
    }

    /// Add the requested tags to the rows in range. Row count never changes.
    pub fn apply_tagging(&mut self, tagging: &DataTagging) -> VigilResult<()> {
        tagging.validate(self.rows.len())?;
        for (tag, ranges) in &tagging.tags {
            for range in ranges {
                for row in &mut self.rows[range.indices()] {
                    row.tags.insert(tag.clone());
                }
            }
        }
        Ok(())
    }

    /// Same columns, only the rows matching `predicate`
    pub fn filter_rows<F>(&self, predicate: F) -> Dataframe
    where
        F: Fn(&Row) -> bool,
    {
        Dataframe {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
            input_tensor_name: self.input_tensor_name.clone(),
            output_tensor_name: self.output_tensor_name.clone(),
        }
    }

    pub fn organic(&self) -> Dataframe {
        self.filter_rows(Row::is_organic)
    }

    pub fn select_ids(&self, ids: &HashSet<String>) -> Dataframe {
        self.filter_rows(|r| ids.contains(&r.id))
    }

    /// Replace all aliases. Columns absent from the map lose their alias.
    pub fn set_column_aliases(&mut self, aliases: &BTreeMap<String, String>) {
        for column in &mut self.columns {
            column.alias = aliases.get(&column.name).cloned();
        }
    }

    pub fn input_tensor_name(&self) -> Option<&str> {
        self.input_tensor_name.as_deref()
    }

    pub fn output_tensor_name(&self) -> Option<&str> {
        self.output_tensor_name.as_deref()
    }

    pub fn set_tensor_names(&mut self, input: Option<String>, output: Option<String>) {
        self.input_tensor_name = input;
        self.output_tensor_name = output;
    }
}
