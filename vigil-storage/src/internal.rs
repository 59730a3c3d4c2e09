//! Line format of internal data and tag filters over it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vigil_core::{VigilError, VigilResult, SYNTHETIC_TAG, UNLABELED_TAG};

/// One line of `<model>-internal_data`, parallel to the same line of `<model>-data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalRecord {
    pub id: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl InternalRecord {
    pub fn parse_line(line: &[u8]) -> VigilResult<Self> {
        serde_json::from_slice(line).map_err(|e| {
            VigilError::Read(format!("Malformed internal data record: {}", e))
        })
    }

    pub fn to_line(&self) -> VigilResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Selects rows by their tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub tags: BTreeSet<String>,
    /// Keep rows carrying none of `tags` instead of rows carrying any
    pub exclude: bool,
}

impl TagFilter {
    pub fn only<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            exclude: false,
        }
    }

    pub fn excluding<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            exclude: true,
        }
    }

    /// Drops synthetic and unlabeled rows
    pub fn organic() -> Self {
        Self::excluding([SYNTHETIC_TAG, UNLABELED_TAG])
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        let any = self.tags.iter().any(|t| tags.contains(t));
        any != self.exclude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_semantics() {
        let organic = TagFilter::organic();
        assert!(organic.matches(&tags(&[])));
        assert!(organic.matches(&tags(&["TRAINING"])));
        assert!(!organic.matches(&tags(&[SYNTHETIC_TAG])));

        let training = TagFilter::only(["TRAINING"]);
        assert!(training.matches(&tags(&["TRAINING", "AUDIT"])));
        assert!(!training.matches(&tags(&["AUDIT"])));
    }

    #[test]
    fn test_record_line() {
        let record = InternalRecord {
            id: "row-1".into(),
            tags: tags(&["A"]),
            timestamp: Utc::now(),
        };
        let line = record.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let parsed = InternalRecord::parse_line(&line[..line.len() - 1]).unwrap();
        assert_eq!(parsed, record);

        assert!(InternalRecord::parse_line(b"not json").unwrap_err().is_read());
    }
}
