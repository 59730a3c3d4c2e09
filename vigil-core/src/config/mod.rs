//! Configuration types for Vigil

use crate::VigilError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Rows returned by batch reads when the caller gives no size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Which backend persists inference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Memory,
    Local,
    Object,
    Relational,
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageFormat::Memory => "memory",
            StorageFormat::Local => "local",
            StorageFormat::Object => "object",
            StorageFormat::Relational => "relational",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub format: StorageFormat,
    /// Root folder for the local-file backend
    #[serde(default = "default_data_folder")]
    pub data_folder: PathBuf,
    #[serde(default)]
    pub object: ObjectStoreConfig,
    #[serde(default)]
    pub relational: RelationalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    /// Legacy local-file folder to copy into the configured backend
    #[serde(default)]
    pub from_folder: Option<PathBuf>,
}

// Default value functions
fn default_batch_size() -> usize { 5000 }
fn default_data_folder() -> PathBuf { PathBuf::from("/inputs") }
fn default_region() -> String { "us-east-1".to_string() }
fn default_database_path() -> PathBuf { PathBuf::from("vigil.db") }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            format: StorageFormat::default(),
            data_folder: default_data_folder(),
            object: ObjectStoreConfig::default(),
            relational: RelationalConfig::default(),
        }
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            endpoint: None,
            prefix: None,
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Reject settings no backend can run with.
    pub fn validate(&self) -> Result<(), VigilError> {
        if self.service.batch_size == 0 {
            return Err(VigilError::Configuration(
                "service.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.storage.format == StorageFormat::Object && self.storage.object.bucket.is_none() {
            return Err(VigilError::Configuration(
                "object storage requires storage.object.bucket".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, VigilError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| VigilError::Configuration(format!("Failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), VigilError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| VigilError::Configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.service.batch_size, 5000);
        assert_eq!(config.storage.format, StorageFormat::Memory);
        assert_eq!(config.storage.data_folder, PathBuf::from("/inputs"));
        assert_eq!(config.storage.object.bucket, None);
        assert_eq!(config.storage.object.region, "us-east-1");
        assert_eq!(config.storage.relational.database_path, PathBuf::from("vigil.db"));
        assert_eq!(config.migration.from_folder, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let toml_content = r#"
[service]
batch_size = 250

[storage]
format = "object"
data_folder = "/data"

[storage.object]
bucket = "inferences"
endpoint = "http://localhost:9000"
prefix = "monitoring"

[migration]
from_folder = "/legacy"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.service.batch_size, 250);
        assert_eq!(config.storage.format, StorageFormat::Object);
        assert_eq!(config.storage.data_folder, PathBuf::from("/data"));
        assert_eq!(config.storage.object.bucket.as_deref(), Some("inferences"));
        assert_eq!(config.storage.object.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.storage.object.region, "us-east-1");
        assert_eq!(config.migration.from_folder, Some(PathBuf::from("/legacy")));
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "this is not valid TOML {{").unwrap();

        match load_config(temp_file.path()).unwrap_err() {
            VigilError::Configuration(msg) => assert!(msg.contains("Failed to parse config")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_object_store_requires_bucket() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[storage]\nformat = \"object\"\n").unwrap();

        match load_config(temp_file.path()).unwrap_err() {
            VigilError::Configuration(msg) => assert!(msg.contains("bucket")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.service.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        match load_config("/nonexistent/path/to/vigil.toml").unwrap_err() {
            VigilError::Io(_) => {}
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.service.batch_size = 42;
        config.storage.format = StorageFormat::Relational;
        config.storage.relational.database_path = PathBuf::from("/tmp/vigil-test.db");

        let temp_file = NamedTempFile::new().unwrap();
        save_config(temp_file.path(), &config).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.service.batch_size, 42);
        assert_eq!(loaded.storage.format, StorageFormat::Relational);
        assert_eq!(
            loaded.storage.relational.database_path,
            PathBuf::from("/tmp/vigil-test.db")
        );
    }

    #[test]
    fn test_storage_format_display() {
        assert_eq!(StorageFormat::Memory.to_string(), "memory");
        assert_eq!(StorageFormat::Local.to_string(), "local");
        assert_eq!(StorageFormat::Object.to_string(), "object");
        assert_eq!(StorageFormat::Relational.to_string(), "relational");
    }
}
