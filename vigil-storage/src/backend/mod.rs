//! Storage backend contract and implementations
//!
//! Every backend stores opaque byte buffers under string keys. Buffers that
//! hold rows use one `\n`-terminated line per row, which is what batch and
//! range reads count. Backends have no schema awareness.

mod local;
mod memory;
pub mod object;
mod relational;

pub use local::LocalFileBackend;
pub use memory::MemoryBackend;
pub use object::{ObjectClient, ObjectStoreBackend, S3Client};
pub use relational::{MetadataRecord, RelationalBackend, StoredRow};

use crate::internal::{InternalRecord, TagFilter};
use crate::io::{join_rows, split_rows};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use vigil_core::{VigilError, VigilResult};

/// Opaque change-detection token. Changes whenever content changes; not
/// comparable across backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// SHA-256 of the content
    Checksum(String),
    /// File modification time and length
    Modified { nanos: u128, len: u64 },
    ETag(String),
    /// Write counter of a relational key
    Generation(i64),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Checksum(sum) => write!(f, "sha256:{}", sum),
            Version::Modified { nanos, len } => write!(f, "mtime:{}:{}", nanos, len),
            Version::ETag(tag) => write!(f, "etag:{}", tag),
            Version::Generation(n) => write!(f, "gen:{}", n),
        }
    }
}

/// Durable byte and row storage keyed by string.
///
/// All calls block. `read_range` rejects `end <= start` with
/// `IllegalArgument` before touching storage, on every backend.
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &'static str;

    /// Whether `key` holds anything. An unreachable store is an error, not
    /// an absent key.
    fn try_exists(&self, key: &str) -> VigilResult<bool>;

    /// Never fails; unreadable or missing keys are reported as absent.
    /// Write paths use `try_exists` instead.
    fn exists(&self, key: &str) -> bool {
        self.try_exists(key).unwrap_or(false)
    }

    /// Full contents, `Read` error if absent
    fn read(&self, key: &str) -> VigilResult<Vec<u8>>;

    /// The last `n` rows, fewer if the key holds fewer. `n == 0` yields nothing.
    fn read_last(&self, key: &str, n: usize) -> VigilResult<Vec<u8>>;

    /// Rows `[start, end)`
    fn read_range(&self, key: &str, start: usize, end: usize) -> VigilResult<Vec<u8>>;

    /// Replace when `overwrite` is set or nothing is stored yet, else append
    fn write(&self, key: &str, bytes: &[u8], overwrite: bool) -> VigilResult<()> {
        let present = self
            .try_exists(key)
            .map_err(|e| VigilError::write(key, "checking for stored rows", e))?;
        if overwrite || !present {
            self.replace(key, bytes)
        } else {
            self.append(key, bytes)
        }
    }

    /// Create or fully replace
    fn replace(&self, key: &str, bytes: &[u8]) -> VigilResult<()>;

    /// Add rows after the existing ones. `Write` error if the key does not exist.
    fn append(&self, key: &str, bytes: &[u8]) -> VigilResult<()>;

    fn last_modified(&self, key: &str) -> VigilResult<Version>;

    /// Every stored key, in no particular order
    fn list_keys(&self) -> VigilResult<Vec<String>>;

    /// Whether `read_last` and `read_range` are implemented
    fn supports_partial_reads(&self) -> bool {
        true
    }

    /// Rows of `data_key` whose parallel `internal_key` record passes
    /// `filter`, keeping the last `limit` when given. Returns the selected
    /// data rows and internal rows.
    fn read_tag_filtered(
        &self,
        data_key: &str,
        internal_key: &str,
        filter: &TagFilter,
        limit: Option<usize>,
    ) -> VigilResult<(Vec<u8>, Vec<u8>)> {
        let data = self.read(data_key)?;
        let internal = self.read(internal_key)?;
        filter_rows_by_tags(&data, &internal, filter, limit)
    }
}

/// Select rows client-side from fully read data and internal buffers
pub fn filter_rows_by_tags(
    data: &[u8],
    internal: &[u8],
    filter: &TagFilter,
    limit: Option<usize>,
) -> VigilResult<(Vec<u8>, Vec<u8>)> {
    let data_rows = split_rows(data);
    let internal_rows = split_rows(internal);
    if data_rows.len() != internal_rows.len() {
        return Err(VigilError::Read(format!(
            "Data holds {} rows but internal data holds {}",
            data_rows.len(),
            internal_rows.len()
        )));
    }

    let mut selected: VecDeque<usize> = VecDeque::new();
    for (index, line) in internal_rows.iter().enumerate() {
        let record = InternalRecord::parse_line(line)?;
        if filter.matches(&record.tags) {
            selected.push_back(index);
            if limit.map_or(false, |max| selected.len() > max) {
                selected.pop_front();
            }
        }
    }

    Ok((
        join_rows(selected.iter().map(|i| data_rows[*i])),
        join_rows(selected.iter().map(|i| internal_rows[*i])),
    ))
}

fn check_range(key: &str, start: usize, end: usize) -> VigilResult<()> {
    if end <= start {
        return Err(VigilError::bad_range(key, start, end));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn internal_line(id: &str, tags: &[&str]) -> Vec<u8> {
        InternalRecord {
            id: id.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            timestamp: Utc::now(),
        }
        .to_line()
        .unwrap()
    }

    #[test]
    fn test_filter_rows_by_tags_keeps_order_and_limit() {
        let data = b"a\nb\nc\nd\n";
        let internal: Vec<u8> = [
            internal_line("1", &[]),
            internal_line("2", &["X"]),
            internal_line("3", &[]),
            internal_line("4", &[]),
        ]
        .concat();

        let (rows, _) =
            filter_rows_by_tags(data, &internal, &TagFilter::excluding(["X"]), None).unwrap();
        assert_eq!(rows, b"a\nc\nd\n".to_vec());

        let (rows, records) =
            filter_rows_by_tags(data, &internal, &TagFilter::excluding(["X"]), Some(2)).unwrap();
        assert_eq!(rows, b"c\nd\n".to_vec());
        assert_eq!(split_rows(&records).len(), 2);
    }

    #[test]
    fn test_filter_rows_by_tags_detects_misalignment() {
        let internal = internal_line("1", &[]);
        let err =
            filter_rows_by_tags(b"a\nb\n", &internal, &TagFilter::organic(), None).unwrap_err();
        assert!(err.is_read());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::Generation(3).to_string(), "gen:3");
        assert_eq!(Version::ETag("\"abc\"".into()).to_string(), "etag:\"abc\"");
    }
}
