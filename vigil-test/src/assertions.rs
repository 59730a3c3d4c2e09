//! Custom assertions for testing
//!
//! Dataframe comparisons that report the first differing row.

use vigil_core::Dataframe;
use vigil_storage::{InternalRecord, StorageBackend};

/// Assert two dataframes hold the same rows in the same order
pub fn assert_same_rows(actual: &Dataframe, expected: &Dataframe) {
    assert_eq!(
        actual.row_count(),
        expected.row_count(),
        "Row counts differ: got {}, expected {}",
        actual.row_count(),
        expected.row_count()
    );
    for (i, (a, e)) in actual.rows().iter().zip(expected.rows()).enumerate() {
        assert_eq!(a, e, "Row {} differs", i);
    }
}

/// Assert the dataframe's row ids, in order
pub fn assert_row_ids(df: &Dataframe, expected: &[&str]) {
    let ids = df.row_ids();
    assert_eq!(ids, expected, "Unexpected row ids");
}

/// Assert every row carries `tag`
pub fn assert_all_tagged(df: &Dataframe, tag: &str) {
    for row in df.rows() {
        assert!(row.tags.contains(tag), "Row {} is missing tag {}", row.id, tag);
    }
}

/// Assert the stored key holds exactly `expected` newline-terminated rows
pub fn assert_stored_rows(backend: &dyn StorageBackend, key: &str, expected: usize) {
    let bytes = backend
        .read(key)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", key, e));
    let rows = bytes.iter().filter(|b| **b == b'\n').count();
    assert_eq!(rows, expected, "{} holds {} rows, expected {}", key, rows, expected);
}

/// Assert every line of an internal data key parses
pub fn assert_internal_records_valid(backend: &dyn StorageBackend, key: &str) {
    let bytes = backend
        .read(key)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", key, e));
    for (i, line) in bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).enumerate() {
        if let Err(e) = InternalRecord::parse_line(line) {
            panic!("Line {} of {} is not an internal record: {}", i, key, e);
        }
    }
}
