//! Test environment management
//!
//! Provides isolated folders for file-backed stores with automatic cleanup.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vigil_core::{save_config, Config, StorageFormat};

/// Isolated test environment, removed on drop
pub struct TestEnvironment {
    _temp_dir: TempDir,
    root_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir =
            TempDir::with_prefix("vigil-test").context("Failed to create temporary directory")?;
        let root_path = temp_dir.path().to_path_buf();

        Ok(Self {
            _temp_dir: temp_dir,
            root_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Folder for a local-file store. Not created, so lazy creation is exercised.
    pub fn data_dir(&self) -> PathBuf {
        self.root_path.join("inputs")
    }

    /// Folder for a legacy local-file store used as a migration source
    pub fn legacy_dir(&self) -> PathBuf {
        self.root_path.join("legacy")
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_path.join("db").join("vigil.db")
    }

    /// Configuration pointing every backend at this environment
    pub fn config(&self, format: StorageFormat) -> Config {
        let mut config = Config::default();
        config.storage.format = format;
        config.storage.data_folder = self.data_dir();
        config.storage.relational.database_path = self.database_path();
        config
    }

    /// Write `config` as TOML in the environment and return its path
    pub fn write_config(&self, config: &Config) -> Result<PathBuf> {
        let path = self.root_path.join("vigil.toml");
        save_config(&path, config).context("Failed to write test config")?;
        Ok(path)
    }

    pub fn write_file(&self, path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
        let full_path = self.root_path.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full_path, content)?;
        Ok(())
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let full_path = self.root_path.join(path);
        Ok(std::fs::read(full_path)?)
    }
}
