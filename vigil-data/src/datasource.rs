//! Orchestration of dataframe reads and writes over a `Storage`
//!
//! The data source owns the metadata lifecycle: every save checks the
//! incoming schema against the stored one before any row is written, and
//! metadata is persisted before the rows. A failure between those two steps
//! leaves the observation count ahead of the stored rows.
//!
//! Writes hold the model's write lock and multi-buffer reads hold its read
//! lock, so a concurrent read sees a model either before or after a write.

use crate::codec::{Codec, EncodedFrame, JsonLinesCodec};
use crate::locks::ModelLocks;
use crate::storage::Storage;
use dashmap::DashSet;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};
use vigil_core::{
    Config, DataTagging, Dataframe, NameMapping, StorageMetadata, VigilError, VigilResult,
};
use vigil_storage::io::split_rows;
use vigil_storage::keys::{data_key, ground_truth_name, internal_data_key};
use vigil_storage::{InternalRecord, TagFilter, Version};

/// Default number of rows returned by batch reads
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Entry point for every dataframe operation.
///
/// Cloning is cheap and clones share the known-models registry and the
/// per-model locks.
#[derive(Clone)]
pub struct DataSource {
    storage: Storage,
    codec: Arc<dyn Codec>,
    known_models: Arc<DashSet<String>>,
    locks: Arc<ModelLocks>,
    batch_size: usize,
}

impl DataSource {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            codec: Arc::new(JsonLinesCodec),
            known_models: Arc::new(DashSet::new()),
            locks: Arc::new(ModelLocks::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(config: &Config) -> VigilResult<Self> {
        config.validate()?;
        let storage = Storage::from_config(&config.storage)?;
        Ok(Self::new(storage).with_batch_size(config.service.batch_size))
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// A view routing every call to `storage`. The registry, locks and codec
    /// are shared; this instance is left untouched.
    pub fn with_storage_override(&self, storage: Storage) -> DataSource {
        DataSource {
            storage,
            ..self.clone()
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub(crate) fn locks(&self) -> &ModelLocks {
        &self.locks
    }

    pub(crate) fn register_model(&self, model_id: &str) {
        self.known_models.insert(model_id.to_string());
    }

    // ----- metadata -----

    /// Stored metadata including column enumerations
    pub fn get_metadata(&self, model_id: &str) -> VigilResult<StorageMetadata> {
        self.storage.metadata.get(model_id, true)
    }

    pub fn has_metadata(&self, model_id: &str) -> bool {
        self.storage.metadata.exists(model_id)
    }

    pub fn get_num_observations(&self, model_id: &str) -> VigilResult<u64> {
        Ok(self.storage.metadata.get(model_id, false)?.observations)
    }

    pub fn has_recorded_inferences(&self, model_id: &str) -> VigilResult<bool> {
        Ok(self.storage.metadata.get(model_id, false)?.recorded_inferences)
    }

    /// Change token of the model's row data
    pub fn last_modified(&self, model_id: &str) -> VigilResult<Version> {
        self.storage.backend.last_modified(&data_key(model_id))
    }

    // ----- reads -----

    fn read_locked<T>(
        &self,
        model_id: &str,
        read: impl FnOnce() -> VigilResult<T>,
    ) -> VigilResult<T> {
        let lock = self.locks.lock_for(model_id);
        let _guard = lock.read();
        read()
    }

    fn decode(&self, model_id: &str, data: &[u8], internal: &[u8]) -> VigilResult<Dataframe> {
        let metadata = self.storage.metadata.get(model_id, false)?;
        let mut df = self.codec.decode(data, internal, &metadata)?;
        df.set_column_aliases(&metadata.joint_name_aliases());
        Ok(df)
    }

    /// Caller holds the model lock
    fn read_all(&self, model_id: &str) -> VigilResult<Dataframe> {
        let backend = &self.storage.backend;
        let data = backend.read(&data_key(model_id))?;
        let internal = backend.read(&internal_data_key(model_id))?;
        self.decode(model_id, &data, &internal)
    }

    /// Every stored row
    pub fn get_dataframe(&self, model_id: &str) -> VigilResult<Dataframe> {
        self.read_locked(model_id, || self.read_all(model_id))
    }

    /// The most recent `batch_size` rows
    pub fn get_dataframe_batch(
        &self,
        model_id: &str,
        batch_size: usize,
    ) -> VigilResult<Dataframe> {
        self.read_locked(model_id, || {
            let backend = &self.storage.backend;
            let data = backend.read_last(&data_key(model_id), batch_size)?;
            let internal = backend.read_last(&internal_data_key(model_id), batch_size)?;
            self.decode(model_id, &data, &internal)
        })
    }

    /// The most recent rows, up to the configured batch size
    pub fn get_dataframe_default_batch(&self, model_id: &str) -> VigilResult<Dataframe> {
        self.get_dataframe_batch(model_id, self.batch_size)
    }

    /// Rows `[start, end)`
    pub fn get_dataframe_range(
        &self,
        model_id: &str,
        start: usize,
        end: usize,
    ) -> VigilResult<Dataframe> {
        if end <= start {
            return Err(VigilError::bad_range(&data_key(model_id), start, end));
        }
        self.read_locked(model_id, || {
            let backend = &self.storage.backend;
            let data = backend.read_range(&data_key(model_id), start, end)?;
            let internal = backend.read_range(&internal_data_key(model_id), start, end)?;
            self.decode(model_id, &data, &internal)
        })
    }

    fn get_filtered(
        &self,
        model_id: &str,
        filter: &TagFilter,
        limit: Option<usize>,
    ) -> VigilResult<Dataframe> {
        self.read_locked(model_id, || {
            let (data, internal) = self.storage.backend.read_tag_filtered(
                &data_key(model_id),
                &internal_data_key(model_id),
                filter,
                limit,
            )?;
            self.decode(model_id, &data, &internal)
        })
    }

    /// Rows that are neither synthetic nor unlabeled
    pub fn get_organic_dataframe(&self, model_id: &str) -> VigilResult<Dataframe> {
        self.get_filtered(model_id, &TagFilter::organic(), None)
    }

    /// The most recent `batch_size` organic rows
    pub fn get_organic_dataframe_batch(
        &self,
        model_id: &str,
        batch_size: usize,
    ) -> VigilResult<Dataframe> {
        self.get_filtered(model_id, &TagFilter::organic(), Some(batch_size))
    }

    /// Rows carrying at least one of `tags`
    pub fn get_dataframe_with_tags(
        &self,
        model_id: &str,
        tags: &BTreeSet<String>,
    ) -> VigilResult<Dataframe> {
        self.get_filtered(model_id, &TagFilter::only(tags.iter().cloned()), None)
    }

    /// Rows carrying none of `tags`
    pub fn get_dataframe_without_tags(
        &self,
        model_id: &str,
        tags: &BTreeSet<String>,
    ) -> VigilResult<Dataframe> {
        self.get_filtered(model_id, &TagFilter::excluding(tags.iter().cloned()), None)
    }

    /// Rows whose id is in `ids`, in stored order
    pub fn get_dataframe_by_ids(
        &self,
        model_id: &str,
        ids: &HashSet<String>,
    ) -> VigilResult<Dataframe> {
        Ok(self.get_dataframe(model_id)?.select_ids(ids))
    }

    fn internal_records(&self, model_id: &str) -> VigilResult<Vec<InternalRecord>> {
        let internal =
            self.read_locked(model_id, || self.storage.backend.read(&internal_data_key(model_id)))?;
        split_rows(&internal)
            .into_iter()
            .map(InternalRecord::parse_line)
            .collect()
    }

    /// Row ids in stored order, optionally only organic rows
    pub fn get_inference_ids(
        &self,
        model_id: &str,
        organic_only: bool,
    ) -> VigilResult<Vec<String>> {
        let organic = TagFilter::organic();
        Ok(self
            .internal_records(model_id)?
            .into_iter()
            .filter(|record| !organic_only || organic.matches(&record.tags))
            .map(|record| record.id)
            .collect())
    }

    /// Distinct tags across all stored rows
    pub fn get_tags(&self, model_id: &str) -> VigilResult<BTreeSet<String>> {
        Ok(self
            .internal_records(model_id)?
            .into_iter()
            .flat_map(|record| record.tags)
            .collect())
    }

    // ----- writes -----

    /// Persist `df` for `model_id`.
    ///
    /// With `overwrite` (or no stored metadata) the metadata is rebuilt from
    /// `df` and the rows replaced. Otherwise the schema must match the stored
    /// one: a conflict fails with `InvalidSchema` before anything is written,
    /// and a match merges metadata and appends the rows.
    ///
    /// Existence of stored metadata and rows is settled before anything is
    /// written. If the store cannot answer, the save fails with `Write` and
    /// leaves both untouched; it never turns an append into a replace.
    pub fn save_dataframe(
        &self,
        df: &Dataframe,
        model_id: &str,
        overwrite: bool,
    ) -> VigilResult<()> {
        self.register_model(model_id);
        let lock = self.locks.lock_for(model_id);
        let _guard = lock.write();

        let incoming = StorageMetadata::from_dataframe(df, model_id);
        let has_stored = !overwrite
            && self
                .storage
                .metadata
                .try_exists(model_id)
                .map_err(|e| VigilError::write(model_id, "checking for stored metadata", e))?;
        let metadata = if !has_stored {
            incoming
        } else {
            let stored = self.storage.metadata.get(model_id, true)?;
            stored.merge(&incoming).map_err(|e| {
                info!("Rejected dataframe for model={}: {}", model_id, e);
                e
            })?
        };

        let replace = overwrite
            || !self
                .storage
                .backend
                .try_exists(&data_key(model_id))
                .map_err(|e| VigilError::write(model_id, "checking for stored rows", e))?;

        let encoded = self.codec.encode(df)?;
        self.storage.metadata.save(&metadata, model_id)?;

        self.write_rows(model_id, &encoded, replace).map_err(|e| {
            error!(
                "Metadata for model={} was updated but its rows were not written: {}",
                model_id, e
            );
            e
        })?;

        debug!(
            "Saved {} rows for model={} ({} observations)",
            df.row_count(),
            model_id,
            metadata.observations
        );
        Ok(())
    }

    /// Caller holds the model's write lock
    fn write_rows(&self, model_id: &str, encoded: &EncodedFrame, replace: bool) -> VigilResult<()> {
        let backend = &self.storage.backend;
        let data = data_key(model_id);
        let internal = internal_data_key(model_id);

        if replace {
            backend.replace(&data, &encoded.data)?;
            backend.replace(&internal, &encoded.internal)?;
        } else {
            backend.append(&data, &encoded.data)?;
            backend.append(&internal, &encoded.internal)?;
        }
        Ok(())
    }

    /// Add tags to row ranges of the stored dataframe. Rows are rewritten in
    /// place; metadata, including aliases and observations, is untouched.
    pub fn tag_dataframe_rows(&self, tagging: &DataTagging) -> VigilResult<()> {
        let model_id = tagging.model_id.as_str();
        let lock = self.locks.lock_for(model_id);
        let _guard = lock.write();

        let mut df = self.read_all(model_id)?;
        df.apply_tagging(tagging)?;
        let encoded = self.codec.encode(&df)?;
        self.write_rows(model_id, &encoded, true)?;

        info!("Tagged rows of model={} with {:?}", model_id, tagging.tags.keys());
        Ok(())
    }

    pub fn apply_name_mapping(&self, mapping: &NameMapping) -> VigilResult<()> {
        let model_id = mapping.model_id.as_str();
        let lock = self.locks.lock_for(model_id);
        let _guard = lock.write();

        let mut metadata = self.storage.metadata.get(model_id, true)?;
        metadata
            .input_schema
            .set_name_mapping(mapping.input_mapping.clone())?;
        metadata
            .output_schema
            .set_name_mapping(mapping.output_mapping.clone())?;
        self.storage.metadata.save(&metadata, model_id)
    }

    pub fn clear_name_mapping(&self, model_id: &str) -> VigilResult<()> {
        let lock = self.locks.lock_for(model_id);
        let _guard = lock.write();

        let mut metadata = self.storage.metadata.get(model_id, true)?;
        metadata.input_schema.clear_name_mapping();
        metadata.output_schema.clear_name_mapping();
        self.storage.metadata.save(&metadata, model_id)
    }

    // ----- registry -----

    /// Every model saved through this process
    pub fn get_known_models(&self) -> BTreeSet<String> {
        self.known_models.iter().map(|m| m.key().clone()).collect()
    }

    /// Known models whose metadata exists in storage. The registry is not modified.
    pub fn get_verified_models(&self) -> BTreeSet<String> {
        self.known_models
            .iter()
            .map(|m| m.key().clone())
            .filter(|model_id| self.has_metadata(model_id))
            .collect()
    }

    // ----- ground truths -----

    pub fn ground_truth_name(&self, model_id: &str) -> String {
        ground_truth_name(model_id)
    }

    pub fn has_ground_truths(&self, model_id: &str) -> bool {
        self.has_metadata(&ground_truth_name(model_id))
    }

    pub fn get_ground_truths(&self, model_id: &str) -> VigilResult<Dataframe> {
        self.get_dataframe(&ground_truth_name(model_id))
    }

    /// Append ground truths, creating the store on first save
    pub fn save_ground_truths(&self, ground_truths: &Dataframe, model_id: &str) -> VigilResult<()> {
        self.save_dataframe(ground_truths, &ground_truth_name(model_id), false)
    }

    /// Ground truths whose row id matches a row of `inferences`
    pub fn get_ground_truths_matching(
        &self,
        model_id: &str,
        inferences: &Dataframe,
    ) -> VigilResult<Dataframe> {
        let ids: HashSet<String> = inferences.row_ids().into_iter().map(str::to_string).collect();
        self.get_dataframe_by_ids(&ground_truth_name(model_id), &ids)
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("storage", &self.storage)
            .field("known_models", &self.known_models.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
