//! Persistence of per-model `StorageMetadata`

mod json;

pub use json::JsonMetadataStore;

use vigil_core::{StorageMetadata, VigilResult};

/// Stores one metadata record per model, separately from row data.
pub trait MetadataStore: Send + Sync {
    /// `Read` error if absent. With `load_column_enumerations` false a store
    /// may skip loading distinct-value sets, leaving them empty.
    fn get(&self, model_id: &str, load_column_enumerations: bool) -> VigilResult<StorageMetadata>;

    /// Full replace. `Write` error on serialization or storage failure.
    fn save(&self, metadata: &StorageMetadata, model_id: &str) -> VigilResult<()>;

    /// `Read` error when the store cannot be reached
    fn try_exists(&self, model_id: &str) -> VigilResult<bool>;

    /// Infallible form of `try_exists`; failures read as absent
    fn exists(&self, model_id: &str) -> bool {
        self.try_exists(model_id).unwrap_or(false)
    }

    /// Ids of every model with stored metadata
    fn list_models(&self) -> VigilResult<Vec<String>>;
}
