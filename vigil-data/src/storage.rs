//! Backend and metadata store bundle selected by configuration

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vigil_core::{StorageConfig, StorageFormat, VigilResult};
use vigil_storage::{
    JsonMetadataStore, LocalFileBackend, MemoryBackend, MetadataStore, ObjectClient,
    ObjectStoreBackend, RelationalBackend, S3Client, StorageBackend,
};

/// Where a data source keeps rows and metadata
#[derive(Clone)]
pub struct Storage {
    pub backend: Arc<dyn StorageBackend>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Storage {
    pub fn new(backend: Arc<dyn StorageBackend>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { backend, metadata }
    }

    /// Metadata kept as JSON documents next to the rows
    pub fn with_json_metadata(backend: Arc<dyn StorageBackend>) -> Self {
        let metadata = Arc::new(JsonMetadataStore::new(backend.clone()));
        Self { backend, metadata }
    }

    pub fn memory() -> Self {
        Self::with_json_metadata(Arc::new(MemoryBackend::new()))
    }

    pub fn local(folder: impl AsRef<Path>) -> Self {
        Self::with_json_metadata(Arc::new(LocalFileBackend::new(folder.as_ref())))
    }

    pub fn object<C: ObjectClient + 'static>(client: C) -> Self {
        Self::with_json_metadata(Arc::new(ObjectStoreBackend::new(client)))
    }

    /// Rows and metadata both in one SQLite database
    pub fn relational(database: impl AsRef<Path>) -> VigilResult<Self> {
        let backend = Arc::new(RelationalBackend::open(database.as_ref())?);
        Ok(Self {
            backend: backend.clone(),
            metadata: backend,
        })
    }

    pub fn from_config(config: &StorageConfig) -> VigilResult<Self> {
        let storage = match config.format {
            StorageFormat::Memory => Self::memory(),
            StorageFormat::Local => Self::local(&config.data_folder),
            StorageFormat::Object => Self::object(S3Client::new(&config.object)?),
            StorageFormat::Relational => Self::relational(&config.relational.database_path)?,
        };
        info!("Using {} storage", storage.name());
        Ok(storage)
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend.name())
            .finish()
    }
}
