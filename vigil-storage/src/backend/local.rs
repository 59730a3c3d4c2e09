/// Backend over newline-delimited files in one folder
///
/// Appends use OS append mode. Overwrites go to a temp file that is renamed
/// into place. Partial reads stream through `io::batch_reader`.
use super::{check_range, StorageBackend, Version};
use crate::internal::TagFilter;
use crate::io::batch_reader;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use vigil_core::{VigilError, VigilResult};

pub struct LocalFileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFileBackend {
    /// The folder is created on first write, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn ensure_root(&self, key: &str) -> VigilResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            VigilError::write(
                key,
                "creating data folder",
                format!("{}: {}", self.root.display(), e),
            )
        })
    }

    fn read_error(key: &str, operation: &str, err: io::Error) -> VigilError {
        if err.kind() == io::ErrorKind::NotFound {
            VigilError::read(key, operation, "file does not exist")
        } else {
            VigilError::read(key, operation, err)
        }
    }
}

impl StorageBackend for LocalFileBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn try_exists(&self, key: &str) -> VigilResult<bool> {
        match fs::metadata(self.path(key)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::read_error(key, "checking file", e)),
        }
    }

    fn read(&self, key: &str) -> VigilResult<Vec<u8>> {
        fs::read(self.path(key)).map_err(|e| Self::read_error(key, "reading file", e))
    }

    fn read_last(&self, key: &str, n: usize) -> VigilResult<Vec<u8>> {
        batch_reader::read_last_lines(&self.path(key), n)
            .map_err(|e| Self::read_error(key, "reading batch", e))
    }

    fn read_range(&self, key: &str, start: usize, end: usize) -> VigilResult<Vec<u8>> {
        check_range(key, start, end)?;
        batch_reader::read_line_range(&self.path(key), start, end)
            .map_err(|e| Self::read_error(key, "reading range", e))
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        let _guard = self.write_lock.lock();
        self.ensure_root(key)?;

        let target = self.path(key);
        let temp = self
            .root
            .join(format!(".{}.tmp-{}", key, uuid::Uuid::new_v4()));

        let result = fs::write(&temp, bytes).and_then(|_| fs::rename(&temp, &target));
        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", temp.display(), cleanup);
                }
            }
            return Err(VigilError::write(key, "writing file", e));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }

    fn append(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        let _guard = self.write_lock.lock();
        let path = self.path(key);
        if !path.is_file() {
            return Err(VigilError::write(
                key,
                "appending",
                format!("{} does not exist", path.display()),
            ));
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| VigilError::write(key, "appending", e))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| VigilError::write(key, "appending", e))?;

        debug!("Appended {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn last_modified(&self, key: &str) -> VigilResult<Version> {
        let metadata =
            fs::metadata(self.path(key)).map_err(|e| Self::read_error(key, "reading version", e))?;
        let nanos = metadata
            .modified()
            .map_err(|e| VigilError::read(key, "reading version", e))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Version::Modified {
            nanos,
            len: metadata.len(),
        })
    }

    fn list_keys(&self) -> VigilResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(VigilError::Read(format!(
                    "Error listing {}: {}",
                    self.root.display(),
                    e
                )))
            }
        };

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    fn read_tag_filtered(
        &self,
        data_key: &str,
        internal_key: &str,
        filter: &TagFilter,
        limit: Option<usize>,
    ) -> VigilResult<(Vec<u8>, Vec<u8>)> {
        batch_reader::read_tag_filtered(
            &self.path(data_key),
            &self.path(internal_key),
            filter,
            limit,
        )
        .map_err(|e| Self::read_error(data_key, "reading tagged rows", e))
    }
}
