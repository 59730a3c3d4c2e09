/// Vigil Core - Shared types for model-monitoring storage
///
/// This crate holds the error taxonomy, configuration and the dataframe
/// data model used by the storage and orchestration crates.
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    load_config, save_config, Config, MigrationConfig, ObjectStoreConfig, RelationalConfig,
    ServiceConfig, StorageConfig, StorageFormat,
};
pub use error::{VigilError, VigilResult};
pub use types::{
    merge_schemas, Column, ColumnRole, ColumnType, DataTagging, Dataframe, Domain, NameMapping,
    Row, Schema, SchemaItem, StorageMetadata, TagRange, Tensor, Value, SYNTHETIC_TAG,
    UNLABELED_TAG,
};
