//! Dataframe orchestration for Vigil
//!
//! `DataSource` keeps per-model metadata and rows consistent over any
//! `Storage`, and `Migrator` switches a data source onto a legacy store and
//! copies models out of it.

pub mod codec;
pub mod datasource;
pub mod locks;
pub mod migrator;
pub mod storage;

pub use codec::{Codec, EncodedFrame, JsonLinesCodec};
pub use datasource::{DataSource, DEFAULT_BATCH_SIZE};
pub use locks::ModelLocks;
pub use migrator::{MigrationReport, MigrationSummary, Migrator};
pub use storage::Storage;
