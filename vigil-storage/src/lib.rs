//! Storage backends and metadata persistence for Vigil

pub mod backend;
pub mod internal;
pub mod io;
pub mod keys;
pub mod metadata;

pub use backend::{
    LocalFileBackend, MemoryBackend, ObjectClient, ObjectStoreBackend, RelationalBackend,
    S3Client, StorageBackend, Version,
};
pub use internal::{InternalRecord, TagFilter};
pub use metadata::{JsonMetadataStore, MetadataStore};
