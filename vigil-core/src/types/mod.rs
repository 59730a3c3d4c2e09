pub mod dataframe;
pub mod metadata;
pub mod schema;
pub mod tagging;
pub mod value;

pub use dataframe::{Column, ColumnRole, Dataframe, Row};
pub use metadata::StorageMetadata;
pub use schema::{merge_schemas, Schema, SchemaItem, MAX_ENUMERATED_COLUMNS, MAX_ENUMERATED_VALUES};
pub use tagging::{
    DataTagging, NameMapping, TagRange, INTERNAL_TAG_PREFIX, SYNTHETIC_TAG, UNLABELED_TAG,
};
pub use value::{ColumnType, Domain, Tensor, Value};
