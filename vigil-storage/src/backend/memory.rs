/// In-process backend over a concurrent map
///
/// Contents do not survive a restart.
use super::{check_range, StorageBackend, Version};
use crate::io::{last_rows, row_range};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;
use vigil_core::{VigilError, VigilResult};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn missing(key: &str, operation: &str) -> VigilError {
        VigilError::read(key, operation, "no data stored in memory")
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn try_exists(&self, key: &str) -> VigilResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn read(&self, key: &str) -> VigilResult<Vec<u8>> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Self::missing(key, "reading"))
    }

    fn read_last(&self, key: &str, n: usize) -> VigilResult<Vec<u8>> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| Self::missing(key, "reading batch"))?;
        Ok(last_rows(entry.value(), n))
    }

    fn read_range(&self, key: &str, start: usize, end: usize) -> VigilResult<Vec<u8>> {
        check_range(key, start, end)?;
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| Self::missing(key, "reading range"))?;
        Ok(row_range(entry.value(), start, end))
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        debug!("Replacing {} ({} bytes) in memory", key, bytes.len());
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn append(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.value_mut().extend_from_slice(bytes);
                Ok(())
            }
            None => Err(VigilError::write(
                key,
                "appending",
                "destination does not exist",
            )),
        }
    }

    fn last_modified(&self, key: &str) -> VigilResult<Version> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| Self::missing(key, "reading version"))?;
        let digest = Sha256::digest(entry.value());
        Ok(Version::Checksum(hex::encode(digest)))
    }

    fn list_keys(&self) -> VigilResult<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}
