//! Backend over an immutable object store
//!
//! Objects cannot be appended to, so an append uploads the new rows to a
//! temp object, composes `[original, temp]` server-side into the original
//! name and then deletes the temp. The sequence is not atomic: a crash after
//! compose leaves an orphaned `tmp-*` object. The temp is only deleted after
//! a successful compose, so a failed append leaves the original untouched.
//!
//! Batch and range reads are not supported and fail with a `Read` error.

mod s3;

pub use s3::S3Client;

use super::{check_range, filter_rows_by_tags, StorageBackend, Version};
use crate::internal::TagFilter;
use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, warn};
use vigil_core::{VigilError, VigilResult};

/// Prefix of temp objects created by appends
pub const TEMP_PREFIX: &str = "tmp-";

/// Minimal blocking object-store client
#[cfg_attr(test, mockall::automock)]
pub trait ObjectClient: Send + Sync {
    /// ETag of the object, `None` if it does not exist
    fn head(&self, name: &str) -> Result<Option<String>>;

    fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Upload a whole object, returning its ETag
    fn put(&self, name: &str, body: Vec<u8>) -> Result<String>;

    fn delete(&self, name: &str) -> Result<()>;

    /// Concatenate `sources` in order into `target`, returning its ETag
    fn compose(&self, target: &str, sources: Vec<String>) -> Result<String>;

    /// Names of every object
    fn list(&self) -> Result<Vec<String>>;
}

pub struct ObjectStoreBackend<C: ObjectClient> {
    client: C,
    append_lock: Mutex<()>,
}

impl<C: ObjectClient> ObjectStoreBackend<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            append_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn unsupported(key: &str, operation: &str) -> VigilError {
        VigilError::read(
            key,
            operation,
            "partial reads are not supported by the object store backend",
        )
    }
}

impl<C: ObjectClient> StorageBackend for ObjectStoreBackend<C> {
    fn name(&self) -> &'static str {
        "object"
    }

    fn try_exists(&self, key: &str) -> VigilResult<bool> {
        self.client
            .head(key)
            .map(|found| found.is_some())
            .map_err(|e| VigilError::read(key, "checking object", format!("{:#}", e)))
    }

    fn read(&self, key: &str) -> VigilResult<Vec<u8>> {
        self.client
            .get(key)
            .map_err(|e| VigilError::read(key, "reading object", format!("{:#}", e)))
    }

    fn read_last(&self, key: &str, n: usize) -> VigilResult<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        Err(Self::unsupported(key, "reading batch"))
    }

    fn read_range(&self, key: &str, start: usize, end: usize) -> VigilResult<Vec<u8>> {
        check_range(key, start, end)?;
        Err(Self::unsupported(key, "reading range"))
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        self.client
            .put(key, bytes.to_vec())
            .map_err(|e| VigilError::write(key, "writing object", format!("{:#}", e)))?;
        debug!("Uploaded {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn append(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        let _guard = self.append_lock.lock();

        match self.client.head(key) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(VigilError::write(
                    key,
                    "appending",
                    "destination object does not exist",
                ))
            }
            Err(e) => return Err(VigilError::write(key, "appending", format!("{:#}", e))),
        }

        let temp = format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4());
        self.client
            .put(&temp, bytes.to_vec())
            .map_err(|e| VigilError::write(key, "uploading append batch", format!("{:#}", e)))?;

        self.client
            .compose(key, vec![key.to_string(), temp.clone()])
            .map_err(|e| {
                warn!("Compose of {} failed, leaving {} in place: {:#}", key, temp, e);
                VigilError::write(key, "composing append", format!("{:#}", e))
            })?;

        if let Err(e) = self.client.delete(&temp) {
            warn!("Appended to {} but could not delete {}: {:#}", key, temp, e);
        }
        Ok(())
    }

    fn last_modified(&self, key: &str) -> VigilResult<Version> {
        match self.client.head(key) {
            Ok(Some(etag)) => Ok(Version::ETag(etag)),
            Ok(None) => Err(VigilError::read(key, "reading version", "object does not exist")),
            Err(e) => Err(VigilError::read(key, "reading version", format!("{:#}", e))),
        }
    }

    fn list_keys(&self) -> VigilResult<Vec<String>> {
        let names = self
            .client
            .list()
            .map_err(|e| VigilError::Read(format!("Error listing objects: {:#}", e)))?;
        Ok(names
            .into_iter()
            .filter(|name| !name.starts_with(TEMP_PREFIX))
            .collect())
    }

    fn supports_partial_reads(&self) -> bool {
        false
    }

    fn read_tag_filtered(
        &self,
        data_key: &str,
        internal_key: &str,
        filter: &TagFilter,
        limit: Option<usize>,
    ) -> VigilResult<(Vec<u8>, Vec<u8>)> {
        if limit.is_some() {
            return Err(Self::unsupported(data_key, "reading tagged batch"));
        }
        let data = self.read(data_key)?;
        let internal = self.read(internal_key)?;
        filter_rows_by_tags(&data, &internal, filter, None)
    }
}
