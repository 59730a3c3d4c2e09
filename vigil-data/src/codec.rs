//! Dataframe byte codec
//!
//! A frame encodes to two parallel newline-delimited buffers: the cell values
//! of each row, and an internal record (id, tags, timestamp) per row.

use vigil_core::{Dataframe, Row, StorageMetadata, Value, VigilError, VigilResult};
use vigil_storage::io::split_rows;
use vigil_storage::InternalRecord;

/// Encoded rows of one dataframe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub internal: Vec<u8>,
}

impl EncodedFrame {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub trait Codec: Send + Sync {
    /// `Write` error when a cell cannot be serialized
    fn encode(&self, df: &Dataframe) -> VigilResult<EncodedFrame>;

    /// Rebuild rows against the stored schema. `Read` error on malformed input.
    fn decode(
        &self,
        data: &[u8],
        internal: &[u8],
        metadata: &StorageMetadata,
    ) -> VigilResult<Dataframe>;
}

/// One JSON array of tagged cell values per row
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl Codec for JsonLinesCodec {
    fn encode(&self, df: &Dataframe) -> VigilResult<EncodedFrame> {
        let mut frame = EncodedFrame::default();
        for row in df.rows() {
            serde_json::to_writer(&mut frame.data, &row.values).map_err(|e| {
                VigilError::Write(format!("Error serializing row {}: {}", row.id, e))
            })?;
            frame.data.push(b'\n');

            let record = InternalRecord {
                id: row.id.clone(),
                tags: row.tags.clone(),
                timestamp: row.timestamp,
            };
            let line = record.to_line().map_err(|e| {
                VigilError::Write(format!("Error serializing row {}: {}", row.id, e))
            })?;
            frame.internal.extend_from_slice(&line);
        }
        Ok(frame)
    }

    fn decode(
        &self,
        data: &[u8],
        internal: &[u8],
        metadata: &StorageMetadata,
    ) -> VigilResult<Dataframe> {
        let data_rows = split_rows(data);
        let internal_rows = split_rows(internal);
        if data_rows.len() != internal_rows.len() {
            return Err(VigilError::read(
                &metadata.model_id,
                "decoding dataframe",
                format!(
                    "{} data rows but {} internal rows",
                    data_rows.len(),
                    internal_rows.len()
                ),
            ));
        }

        let mut rows = Vec::with_capacity(data_rows.len());
        for (line, internal_line) in data_rows.into_iter().zip(internal_rows) {
            let values: Vec<Value> = serde_json::from_slice(line).map_err(|e| {
                VigilError::read(&metadata.model_id, "decoding dataframe", e)
            })?;
            let record = InternalRecord::parse_line(internal_line)?;
            rows.push(Row {
                id: record.id,
                tags: record.tags,
                timestamp: record.timestamp,
                values,
            });
        }

        let mut df = Dataframe::from_rows(metadata.columns(), rows)
            .map_err(|e| VigilError::read(&metadata.model_id, "decoding dataframe", e))?;
        df.set_tensor_names(
            metadata.input_tensor_name.clone(),
            metadata.output_tensor_name.clone(),
        );
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigil_core::{Column, ColumnType, Tensor};

    fn frame() -> Dataframe {
        let mut df = Dataframe::new(vec![
            Column::input("text", ColumnType::Text),
            Column::input("tensor", ColumnType::Tensor),
            Column::output("y", ColumnType::Number),
        ]);
        df.push_row(
            Row::new(vec![
                Value::Text("line\nbreak, \"quoted\"".into()),
                Value::Tensor(Tensor::new(vec![1, 2], vec![0.5, -0.5])),
                Value::Number(3.0),
            ])
            .with_tag("TRAINING"),
        )
        .unwrap();
        df.push_values(vec![
            Value::Text(String::new()),
            Value::Tensor(Tensor::vector(vec![])),
            Value::Number(-1.25),
        ])
        .unwrap();
        df
    }

    #[test]
    fn test_encoded_layout() {
        let encoded = JsonLinesCodec.encode(&frame()).unwrap();
        // Embedded newlines are escaped, so one line per row
        assert_eq!(split_rows(&encoded.data).len(), 2);
        assert_eq!(split_rows(&encoded.internal).len(), 2);
        assert!(encoded.internal.starts_with(b"{\"id\":"));
    }

    #[test]
    fn test_decode_restores_rows() {
        let df = frame();
        let metadata = StorageMetadata::from_dataframe(&df, "m");
        let encoded = JsonLinesCodec.encode(&df).unwrap();

        let decoded = JsonLinesCodec
            .decode(&encoded.data, &encoded.internal, &metadata)
            .unwrap();
        assert_eq!(decoded, df);
    }

    #[test]
    fn test_nan_cannot_be_encoded() {
        let mut df = Dataframe::new(vec![Column::input("x", ColumnType::Number)]);
        df.push_values(vec![Value::Number(f64::NAN)]).unwrap();
        // serde_json writes non-finite floats as null, which no longer decodes
        let encoded = JsonLinesCodec.encode(&df).unwrap();
        let metadata = StorageMetadata::from_dataframe(&df, "m");
        let err = JsonLinesCodec
            .decode(&encoded.data, &encoded.internal, &metadata)
            .unwrap_err();
        assert!(err.is_read());
    }

    #[test]
    fn test_decode_rejects_misaligned_buffers() {
        let df = frame();
        let metadata = StorageMetadata::from_dataframe(&df, "m");
        let encoded = JsonLinesCodec.encode(&df).unwrap();
        let err = JsonLinesCodec
            .decode(&encoded.data, b"", &metadata)
            .unwrap_err();
        assert!(err.is_read());
    }

    #[test]
    fn test_decode_rejects_schema_drift() {
        let df = frame();
        let encoded = JsonLinesCodec.encode(&df).unwrap();
        let mut other = Dataframe::new(vec![Column::input("only", ColumnType::Number)]);
        other.push_values(vec![Value::Number(1.0)]).unwrap();
        let metadata = StorageMetadata::from_dataframe(&other, "m");

        let err = JsonLinesCodec
            .decode(&encoded.data, &encoded.internal, &metadata)
            .unwrap_err();
        assert!(err.is_read());
    }
}
