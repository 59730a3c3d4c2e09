use super::MetadataStore;
use crate::backend::StorageBackend;
use crate::keys::{metadata_key, model_of_metadata_key};
use std::sync::Arc;
use tracing::debug;
use vigil_core::{StorageMetadata, VigilError, VigilResult};

/// Metadata as `<model>-metadata.json` documents on any backend.
///
/// Enumerations live inline, so the load flag has no effect.
pub struct JsonMetadataStore {
    backend: Arc<dyn StorageBackend>,
}

impl JsonMetadataStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }
}

impl MetadataStore for JsonMetadataStore {
    fn get(&self, model_id: &str, _load_column_enumerations: bool) -> VigilResult<StorageMetadata> {
        let bytes = self.backend.read(&metadata_key(model_id))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VigilError::read(model_id, "parsing metadata", e))
    }

    fn save(&self, metadata: &StorageMetadata, model_id: &str) -> VigilResult<()> {
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|e| VigilError::write(model_id, "serializing metadata", e))?;
        self.backend.replace(&metadata_key(model_id), &bytes)?;
        debug!("Saved metadata for {} ({} observations)", model_id, metadata.observations);
        Ok(())
    }

    fn try_exists(&self, model_id: &str) -> VigilResult<bool> {
        self.backend.try_exists(&metadata_key(model_id))
    }

    fn list_models(&self) -> VigilResult<Vec<String>> {
        let mut models: Vec<String> = self
            .backend
            .list_keys()?
            .iter()
            .filter_map(|key| model_of_metadata_key(key))
            .map(str::to_string)
            .collect();
        models.sort();
        Ok(models)
    }
}
