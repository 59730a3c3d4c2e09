//! Row tagging and column name mapping requests

use crate::{VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix reserved for tags the service assigns itself
pub const INTERNAL_TAG_PREFIX: &str = "_vigil";

/// Rows produced by a generator rather than a live model
pub const SYNTHETIC_TAG: &str = "_vigil_synthetic";

/// Live inferences awaiting a ground truth label
pub const UNLABELED_TAG: &str = "_vigil_unlabeled";

/// Row indices a tag applies to, either one row or `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRange {
    Single(usize),
    Span(usize, usize),
}

impl TagRange {
    pub fn validate(&self, row_count: usize) -> VigilResult<()> {
        match *self {
            TagRange::Single(i) if i >= row_count => Err(VigilError::IllegalArgument(format!(
                "Row index {} is out of bounds for a dataframe of {} rows",
                i, row_count
            ))),
            TagRange::Span(start, end) if end <= start => Err(VigilError::IllegalArgument(
                format!("Tag range [{}, {}) must have end > start", start, end),
            )),
            TagRange::Span(_, end) if end > row_count => Err(VigilError::IllegalArgument(format!(
                "Tag range end {} is out of bounds for a dataframe of {} rows",
                end, row_count
            ))),
            _ => Ok(()),
        }
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        match *self {
            TagRange::Single(i) => i..i + 1,
            TagRange::Span(start, end) => start..end,
        }
    }
}

/// A request to tag rows of one model's stored dataframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTagging {
    pub model_id: String,
    pub tags: BTreeMap<String, Vec<TagRange>>,
}

impl DataTagging {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_range(mut self, tag: impl Into<String>, range: TagRange) -> Self {
        self.tags.entry(tag.into()).or_default().push(range);
        self
    }

    /// Check every range against the row count. Internal tags may not be set by callers.
    pub fn validate(&self, row_count: usize) -> VigilResult<()> {
        for (tag, ranges) in &self.tags {
            if tag.starts_with(INTERNAL_TAG_PREFIX) {
                return Err(VigilError::IllegalArgument(format!(
                    "Tag '{}' uses the reserved prefix {}",
                    tag, INTERNAL_TAG_PREFIX
                )));
            }
            for range in ranges {
                range.validate(row_count)?;
            }
        }
        Ok(())
    }
}

/// Public aliases for a model's input and output columns, keyed by original name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMapping {
    pub model_id: String,
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub output_mapping: BTreeMap<String, String>,
}

impl NameMapping {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }
}
