//! Column schemas and the pure schema merge

use super::dataframe::{ColumnRole, Dataframe};
use super::value::{ColumnType, Domain};
use crate::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Columns with more distinct values than this are not enumerated
pub const MAX_ENUMERATED_VALUES: usize = 200;

/// Dataframes with this many columns or more skip enumeration entirely
pub const MAX_ENUMERATED_COLUMNS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaItem {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub index: usize,
    /// Distinct observed values; `None` when not enumerable
    #[serde(default)]
    pub values: Option<BTreeSet<String>>,
    #[serde(default)]
    pub domain: Option<Domain>,
}

impl SchemaItem {
    pub fn new(name: impl Into<String>, column_type: ColumnType, index: usize) -> Self {
        Self {
            name: name.into(),
            column_type,
            index,
            values: None,
            domain: None,
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn merge_values(&self, incoming: &SchemaItem) -> Option<BTreeSet<String>> {
        match (&self.values, &incoming.values) {
            (Some(stored), Some(new)) => {
                let union: BTreeSet<String> = stored.union(new).cloned().collect();
                (union.len() <= MAX_ENUMERATED_VALUES).then_some(union)
            }
            _ => None,
        }
    }
}

/// Compatibility ignores enumerations and domains.
impl PartialEq for SchemaItem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.column_type == other.column_type
            && self.index == other.index
    }
}

impl Eq for SchemaItem {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub items: Vec<SchemaItem>,
    /// Original column name to public alias
    #[serde(default)]
    pub name_mapping: BTreeMap<String, String>,
}

impl Schema {
    pub fn new(items: Vec<SchemaItem>) -> Self {
        Self {
            items,
            name_mapping: BTreeMap::new(),
        }
    }

    /// Schema of the columns with `role`, enumerating values where allowed
    pub fn from_dataframe(df: &Dataframe, role: ColumnRole) -> Self {
        let enumerate = df.column_count() < MAX_ENUMERATED_COLUMNS;
        let items = df
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.role == role)
            .map(|(index, column)| {
                let values = if enumerate && column.column_type.is_enumerable() {
                    let distinct: BTreeSet<String> = df
                        .column_values(index)
                        .filter_map(|v| v.enumeration_key())
                        .collect();
                    (distinct.len() <= MAX_ENUMERATED_VALUES).then_some(distinct)
                } else {
                    None
                };
                SchemaItem {
                    name: column.name.clone(),
                    column_type: column.column_type,
                    index,
                    values,
                    domain: column.domain.clone(),
                }
            })
            .collect();

        let name_mapping = df
            .columns()
            .iter()
            .filter(|c| c.role == role)
            .filter_map(|c| c.alias.clone().map(|alias| (c.name.clone(), alias)))
            .collect();

        Self { items, name_mapping }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items ordered by their column index
    pub fn ordered_items(&self) -> Vec<&SchemaItem> {
        let mut items: Vec<&SchemaItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.index);
        items
    }

    /// Column names with aliases applied
    pub fn name_mapped_names(&self) -> Vec<String> {
        self.ordered_items()
            .into_iter()
            .map(|item| {
                self.name_mapping
                    .get(&item.name)
                    .cloned()
                    .unwrap_or_else(|| item.name.clone())
            })
            .collect()
    }

    /// Original name for an alias, or the name itself when unmapped
    pub fn original_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.name_mapping
            .iter()
            .find(|(_, alias)| alias.as_str() == name)
            .map(|(original, _)| original.as_str())
            .unwrap_or(name)
    }

    /// Install aliases. Every mapped name must be a column of this schema.
    pub fn set_name_mapping(&mut self, mapping: BTreeMap<String, String>) -> VigilResult<()> {
        let names = self.names();
        if let Some(unknown) = mapping.keys().find(|k| !names.contains(k.as_str())) {
            return Err(VigilError::IllegalArgument(format!(
                "Cannot alias '{}': not a column of this schema {:?}",
                unknown, names
            )));
        }
        self.name_mapping = mapping;
        Ok(())
    }

    pub fn clear_name_mapping(&mut self) {
        self.name_mapping.clear();
    }

    /// Describe why `incoming` is not compatible with this schema
    pub fn conflict_with(&self, incoming: &Schema) -> Option<String> {
        let stored_names = self.names();
        let incoming_names = incoming.names();
        if stored_names != incoming_names {
            return Some(format!(
                "column names do not match. \
                 Existing schema columns={:?}, incoming schema columns={:?}",
                stored_names, incoming_names
            ));
        }

        let mismatches: Vec<String> = self
            .items
            .iter()
            .filter_map(|stored| {
                let new = incoming.get(&stored.name)?;
                (stored != new).then(|| {
                    format!(
                        "column {}: existing type={} index={}, incoming type={} index={}",
                        stored.name, stored.column_type, stored.index, new.column_type, new.index
                    )
                })
            })
            .collect();

        if mismatches.is_empty() {
            None
        } else {
            Some(mismatches.join("; "))
        }
    }
}

/// Merge an incoming schema into the stored one.
///
/// Fails with `InvalidSchema` when the column sets or any (name, type, index)
/// triple differ. Otherwise enumerations are unioned, with a non-enumerable
/// side making the result non-enumerable. The stored name mapping is kept.
pub fn merge_schemas(stored: &Schema, incoming: &Schema) -> VigilResult<Schema> {
    if let Some(reason) = stored.conflict_with(incoming) {
        return Err(VigilError::InvalidSchema(reason));
    }

    let items = stored
        .items
        .iter()
        .map(|item| {
            let values = incoming
                .get(&item.name)
                .and_then(|new| item.merge_values(new));
            SchemaItem {
                values,
                ..item.clone()
            }
        })
        .collect();

    Ok(Schema {
        items,
        name_mapping: stored.name_mapping.clone(),
    })
}
