//! Storage override control and explicit copy from a legacy store
//!
//! While an override is installed, `data_source()` hands out a view whose
//! reads and writes all target the override. Nothing is copied back when
//! the override is cleared; copying is the job of `migrate_model` and
//! `migrate_all`, which move raw rows so ids, timestamps and tags survive.

use crate::datasource::DataSource;
use crate::storage::Storage;
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{info, warn};
use vigil_core::{MigrationConfig, VigilError, VigilResult};
use vigil_storage::io::split_rows;
use vigil_storage::keys::{data_key, internal_data_key};

/// Outcome of copying one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub model_id: String,
    pub rows: usize,
    /// Number of reads issued against the source
    pub batches: usize,
}

/// Outcome of copying every model of a source
#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub migrated: Vec<MigrationReport>,
    /// Model id and error message of each failed copy
    pub failed: Vec<(String, String)>,
}

impl MigrationSummary {
    pub fn total_rows(&self) -> usize {
        self.migrated.iter().map(|r| r.rows).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Migrator {
    native: DataSource,
    override_view: RwLock<Option<DataSource>>,
    threads: usize,
}

impl Migrator {
    pub fn new(native: DataSource) -> Self {
        Self {
            native,
            override_view: RwLock::new(None),
            threads: 0,
        }
    }

    /// Worker threads for `migrate_all`. Zero means one per CPU.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Route every subsequent `data_source()` call to `storage`
    pub fn set_storage_override(&self, storage: Storage) {
        info!("Installing {} storage override", storage.name());
        *self.override_view.write() = Some(self.native.with_storage_override(storage));
    }

    pub fn clear_storage_override(&self) {
        if self.override_view.write().take().is_some() {
            info!("Cleared storage override");
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.override_view.read().is_some()
    }

    /// The override view while one is installed, else the native source
    pub fn data_source(&self) -> DataSource {
        match self.override_view.read().as_ref() {
            Some(view) => view.clone(),
            None => self.native.clone(),
        }
    }

    pub fn native(&self) -> &DataSource {
        &self.native
    }

    /// Copy one model from `source` into the native storage, replacing
    /// whatever the native side held for it. Holds the model's write lock
    /// for the whole copy, so native readers never see a partial model.
    pub fn migrate_model(&self, source: &Storage, model_id: &str) -> VigilResult<MigrationReport> {
        let lock = self.native.locks().lock_for(model_id);
        let _guard = lock.write();

        let metadata = source.metadata.get(model_id, true)?;
        let target = self.native.storage();
        target.metadata.save(&metadata, model_id)?;
        self.native.register_model(model_id);

        let data = data_key(model_id);
        let internal = internal_data_key(model_id);

        if !source.backend.supports_partial_reads() {
            let rows = source.backend.read(&data)?;
            let internal_rows = source.backend.read(&internal)?;
            target.backend.replace(&data, &rows)?;
            target.backend.replace(&internal, &internal_rows)?;
            let report = MigrationReport {
                model_id: model_id.to_string(),
                rows: split_rows(&rows).len(),
                batches: 1,
            };
            info!("Migrated model={}: {} rows in one read", model_id, report.rows);
            return Ok(report);
        }

        let batch = self.native.batch_size().max(1);
        let mut start = 0;
        let mut batches = 0;
        loop {
            let rows = source.backend.read_range(&data, start, start + batch)?;
            let internal_rows = source.backend.read_range(&internal, start, start + batch)?;
            let count = split_rows(&rows).len();
            if count != split_rows(&internal_rows).len() {
                return Err(VigilError::read(
                    model_id,
                    "migrating rows",
                    format!("data and internal data disagree in window starting at {}", start),
                ));
            }

            if batches == 0 {
                target.backend.replace(&data, &rows)?;
                target.backend.replace(&internal, &internal_rows)?;
            } else if count > 0 {
                target.backend.append(&data, &rows)?;
                target.backend.append(&internal, &internal_rows)?;
            }
            batches += 1;
            start += count;

            if count < batch {
                break;
            }
        }

        info!("Migrated model={}: {} rows in {} batches", model_id, start, batches);
        Ok(MigrationReport {
            model_id: model_id.to_string(),
            rows: start,
            batches,
        })
    }

    /// Copy every model listed by the source's metadata store, in parallel.
    /// Failures are collected per model and do not stop the others.
    pub fn migrate_all(&self, source: &Storage) -> VigilResult<MigrationSummary> {
        let models = source.metadata.list_models()?;
        info!("Migrating {} models from {} storage", models.len(), source.name());

        let threads = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                VigilError::Configuration(format!("Failed to build migration pool: {}", e))
            })?;

        let results: Vec<(String, VigilResult<MigrationReport>)> = pool.install(|| {
            models
                .par_iter()
                .map(|model_id| (model_id.clone(), self.migrate_model(source, model_id)))
                .collect()
        });

        let mut summary = MigrationSummary::default();
        for (model_id, result) in results {
            match result {
                Ok(report) => summary.migrated.push(report),
                Err(e) => {
                    warn!("Failed to migrate model={}: {}", model_id, e);
                    summary.failed.push((model_id, e.to_string()));
                }
            }
        }
        summary.migrated.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(summary)
    }

    /// Run the migration named by configuration. `None` when no source
    /// folder is configured or it does not exist.
    pub fn migrate_from_config(
        &self,
        config: &MigrationConfig,
    ) -> VigilResult<Option<MigrationSummary>> {
        let Some(folder) = config.from_folder.as_ref() else {
            return Ok(None);
        };
        if !folder.is_dir() {
            warn!(
                "Migration folder {} does not exist, skipping migration",
                folder.display()
            );
            return Ok(None);
        }
        let source = Storage::local(folder);
        self.migrate_all(&source).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigil_core::{Column, ColumnType, Dataframe, Row, Value};

    fn frame(rows: usize) -> Dataframe {
        let mut df = Dataframe::new(vec![
            Column::input("x", ColumnType::Number),
            Column::output("y", ColumnType::Boolean),
        ]);
        for i in 0..rows {
            df.push_row(
                Row::new(vec![Value::Number(i as f64), Value::Boolean(i % 2 == 0)])
                    .with_id(format!("row-{}", i)),
            )
            .unwrap();
        }
        df
    }

    #[test]
    fn test_override_routes_and_clears() {
        let migrator = Migrator::new(DataSource::new(Storage::memory()));
        let legacy = Storage::memory();
        DataSource::new(legacy.clone())
            .save_dataframe(&frame(4), "m", true)
            .unwrap();

        migrator.set_storage_override(legacy);
        assert!(migrator.is_overridden());
        assert_eq!(migrator.data_source().get_dataframe("m").unwrap().row_count(), 4);

        migrator.clear_storage_override();
        assert!(!migrator.is_overridden());
        assert!(migrator.data_source().get_dataframe("m").unwrap_err().is_read());
    }

    #[test]
    fn test_migrate_model_in_windows() {
        let native = DataSource::new(Storage::memory()).with_batch_size(3);
        let migrator = Migrator::new(native);
        let legacy = Storage::memory();
        let source = DataSource::new(legacy.clone());
        source.save_dataframe(&frame(7), "m", true).unwrap();

        let report = migrator.migrate_model(&legacy, "m").unwrap();
        assert_eq!(report.rows, 7);
        assert_eq!(report.batches, 3);

        let copied = migrator.native().get_dataframe("m").unwrap();
        assert_eq!(copied, source.get_dataframe("m").unwrap());
        assert_eq!(migrator.native().get_num_observations("m").unwrap(), 7);
        assert!(migrator.native().get_known_models().contains("m"));
    }

    #[test]
    fn test_migrate_exact_multiple_issues_trailing_read() {
        let migrator = Migrator::new(DataSource::new(Storage::memory()).with_batch_size(2));
        let legacy = Storage::memory();
        DataSource::new(legacy.clone())
            .save_dataframe(&frame(4), "m", true)
            .unwrap();

        let report = migrator.migrate_model(&legacy, "m").unwrap();
        assert_eq!(report.rows, 4);
        assert_eq!(report.batches, 3);
        assert_eq!(migrator.native().get_dataframe("m").unwrap().row_count(), 4);
    }

    #[test]
    fn test_migrate_replaces_stale_native_rows() {
        let migrator = Migrator::new(DataSource::new(Storage::memory()));
        migrator.native().save_dataframe(&frame(9), "m", true).unwrap();
        let legacy = Storage::memory();
        DataSource::new(legacy.clone())
            .save_dataframe(&frame(2), "m", true)
            .unwrap();

        migrator.migrate_model(&legacy, "m").unwrap();
        assert_eq!(migrator.native().get_dataframe("m").unwrap().row_count(), 2);
    }

    #[test]
    fn test_missing_folder_skips() {
        let migrator = Migrator::new(DataSource::new(Storage::memory()));
        let none = migrator.migrate_from_config(&MigrationConfig::default()).unwrap();
        assert!(none.is_none());

        let config = MigrationConfig {
            from_folder: Some("/definitely/not/here".into()),
        };
        assert!(migrator.migrate_from_config(&config).unwrap().is_none());
    }
}
