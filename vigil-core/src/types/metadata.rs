//! Per-model storage metadata

use super::dataframe::{Column, ColumnRole, Dataframe};
use super::schema::{merge_schemas, Schema};
use super::tagging::UNLABELED_TAG;
use crate::VigilResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMetadata {
    pub model_id: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub observations: u64,
    #[serde(default)]
    pub recorded_inferences: bool,
    #[serde(default)]
    pub input_tensor_name: Option<String>,
    #[serde(default)]
    pub output_tensor_name: Option<String>,
}

impl StorageMetadata {
    /// Fresh metadata describing `df`, counting its rows as observations
    pub fn from_dataframe(df: &Dataframe, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            input_schema: Schema::from_dataframe(df, ColumnRole::Input),
            output_schema: Schema::from_dataframe(df, ColumnRole::Output),
            observations: df.row_count() as u64,
            recorded_inferences: df.tags().contains(UNLABELED_TAG),
            input_tensor_name: df.input_tensor_name().map(str::to_string),
            output_tensor_name: df.output_tensor_name().map(str::to_string),
        }
    }

    /// Fold `incoming` into this record without mutating either side.
    ///
    /// Observations are summed and `recorded_inferences` is OR-ed. Tensor
    /// names and aliases stay as stored unless the stored side has none.
    pub fn merge(&self, incoming: &StorageMetadata) -> VigilResult<StorageMetadata> {
        let input_schema = merge_schemas(&self.input_schema, &incoming.input_schema)?;
        let output_schema = merge_schemas(&self.output_schema, &incoming.output_schema)?;

        Ok(StorageMetadata {
            model_id: self.model_id.clone(),
            input_schema,
            output_schema,
            observations: self.observations + incoming.observations,
            recorded_inferences: self.recorded_inferences || incoming.recorded_inferences,
            input_tensor_name: self
                .input_tensor_name
                .clone()
                .or_else(|| incoming.input_tensor_name.clone()),
            output_tensor_name: self
                .output_tensor_name
                .clone()
                .or_else(|| incoming.output_tensor_name.clone()),
        })
    }

    /// Aliases of both schemas in one map
    pub fn joint_name_aliases(&self) -> BTreeMap<String, String> {
        self.input_schema
            .name_mapping
            .iter()
            .chain(self.output_schema.name_mapping.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Columns in index order, as the decoder should rebuild them
    pub fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<(usize, Column)> = self
            .input_schema
            .items
            .iter()
            .map(|item| (item, ColumnRole::Input))
            .chain(self.output_schema.items.iter().map(|item| (item, ColumnRole::Output)))
            .map(|(item, role)| {
                let mut column = Column::new(item.name.clone(), item.column_type, role);
                column.domain = item.domain.clone();
                (item.index, column)
            })
            .collect();
        columns.sort_by_key(|(index, _)| *index);
        columns.into_iter().map(|(_, column)| column).collect()
    }

    pub fn column_count(&self) -> usize {
        self.input_schema.len() + self.output_schema.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::dataframe::Row;
    use crate::types::value::{ColumnType, Value};
    use pretty_assertions::assert_eq;

    fn frame(colours: &[&str]) -> Dataframe {
        let mut df = Dataframe::new(vec![
            Column::input("colour", ColumnType::Categorical),
            Column::input("size", ColumnType::Number),
            Column::output("score", ColumnType::Number),
        ]);
        for (i, colour) in colours.iter().enumerate() {
            df.push_values(vec![
                Value::Categorical(colour.to_string()),
                Value::Number(i as f64),
                Value::Number(0.5),
            ])
            .unwrap();
        }
        df
    }

    #[test]
    fn test_from_dataframe() {
        let metadata = StorageMetadata::from_dataframe(&frame(&["red", "red", "blue"]), "m1");
        assert_eq!(metadata.model_id, "m1");
        assert_eq!(metadata.observations, 3);
        assert_eq!(metadata.input_schema.len(), 2);
        assert_eq!(metadata.output_schema.len(), 1);
        assert!(!metadata.recorded_inferences);
        assert_eq!(
            metadata.input_schema.get("colour").unwrap().values.as_ref().unwrap().len(),
            2
        );
    }

    #[test]
    fn test_recorded_inferences_flag() {
        let mut df = frame(&[]);
        df.push_row(
            Row::new(vec![
                Value::Categorical("a".into()),
                Value::Number(0.0),
                Value::Number(1.0),
            ])
            .with_tag(UNLABELED_TAG),
        )
        .unwrap();
        assert!(StorageMetadata::from_dataframe(&df, "m").recorded_inferences);
    }

    #[test]
    fn test_merge_sums_observations() {
        let stored = StorageMetadata::from_dataframe(&frame(&["red"; 10]), "m");
        let incoming = StorageMetadata::from_dataframe(&frame(&["green"; 5]), "m");

        let merged = stored.merge(&incoming).unwrap();
        assert_eq!(merged.observations, 15);
        let colours: Vec<&String> = merged
            .input_schema
            .get("colour")
            .unwrap()
            .values
            .as_ref()
            .unwrap()
            .iter()
            .collect();
        assert_eq!(colours, vec!["green", "red"]);
        // The stored record is untouched
        assert_eq!(stored.observations, 10);
    }

    #[test]
    fn test_columns_rebuilt_in_index_order() {
        let metadata = StorageMetadata::from_dataframe(&frame(&["a"]), "m");
        let names: Vec<String> = metadata.columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["colour", "size", "score"]);
    }

    #[test]
    fn test_json_field_names() {
        let metadata = StorageMetadata::from_dataframe(&frame(&["a"]), "m");
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("inputSchema").is_some());
        assert!(json.get("recordedInferences").is_some());
        let back: StorageMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }
}
