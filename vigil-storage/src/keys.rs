//! Persisted key layout for one model

pub const METADATA_SUFFIX: &str = "-metadata.json";
pub const DATA_SUFFIX: &str = "-data";
pub const INTERNAL_DATA_SUFFIX: &str = "-internal_data";
pub const GROUND_TRUTH_SUFFIX: &str = "-ground-truths";

pub fn metadata_key(model_id: &str) -> String {
    format!("{}{}", model_id, METADATA_SUFFIX)
}

pub fn data_key(model_id: &str) -> String {
    format!("{}{}", model_id, DATA_SUFFIX)
}

pub fn internal_data_key(model_id: &str) -> String {
    format!("{}{}", model_id, INTERNAL_DATA_SUFFIX)
}

/// Model id under which a model's ground truths are stored
pub fn ground_truth_name(model_id: &str) -> String {
    format!("{}{}", model_id, GROUND_TRUTH_SUFFIX)
}

pub fn is_internal_data_key(key: &str) -> bool {
    key.ends_with(INTERNAL_DATA_SUFFIX)
}

/// Model id of a metadata key, if `key` is one
pub fn model_of_metadata_key(key: &str) -> Option<&str> {
    key.strip_suffix(METADATA_SUFFIX).filter(|m| !m.is_empty())
}
