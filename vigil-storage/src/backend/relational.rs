/// Relational backend on SQLite
///
/// Each logical row is one `store_rows` record ordered by `seq`, so batch and
/// range reads are `LIMIT`/`OFFSET` queries. Tags of internal data rows are
/// projected into `row_tags` so tag filters run in SQL. Every write runs in
/// its own transaction.
///
/// The same database also stores model metadata, with column enumerations
/// in `column_values` loaded only when asked for.
use super::{check_range, StorageBackend, Version};
use crate::internal::{InternalRecord, TagFilter};
use crate::io::{join_rows, split_rows};
use crate::keys::is_internal_data_key;
use crate::metadata::MetadataStore;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use vigil_core::{Schema, StorageMetadata, VigilError, VigilResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS store_keys (
    store_key TEXT PRIMARY KEY,
    generation INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS store_rows (
    store_key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (store_key, seq)
);
CREATE TABLE IF NOT EXISTS row_tags (
    store_key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (store_key, seq, tag)
);
CREATE TABLE IF NOT EXISTS model_metadata (
    model_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS column_values (
    model_id TEXT NOT NULL,
    role TEXT NOT NULL,
    column_name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (model_id, role, column_name, value)
);
";

/// One persisted row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub store_key: String,
    pub seq: i64,
    pub body: Vec<u8>,
}

impl StoredRow {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            store_key: row.get(0)?,
            seq: row.get(1)?,
            body: row.get(2)?,
        })
    }

    fn insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO store_rows (store_key, seq, body) VALUES (?1, ?2, ?3)",
            params![self.store_key, self.seq, self.body],
        )?;
        if is_internal_data_key(&self.store_key) {
            match InternalRecord::parse_line(&self.body) {
                Ok(record) => {
                    for tag in &record.tags {
                        tx.execute(
                            "INSERT OR IGNORE INTO row_tags (store_key, seq, tag)
                             VALUES (?1, ?2, ?3)",
                            params![self.store_key, self.seq, tag],
                        )?;
                    }
                }
                Err(e) => warn!(
                    "Row {} of {} has no readable tags: {}",
                    self.seq, self.store_key, e
                ),
            }
        }
        Ok(())
    }
}

/// Metadata document without enumerations, which live in `column_values`
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub model_id: String,
    pub body: String,
}

impl MetadataRecord {
    fn from_metadata(metadata: &StorageMetadata, model_id: &str) -> VigilResult<Self> {
        let mut stripped = metadata.clone();
        for item in stripped
            .input_schema
            .items
            .iter_mut()
            .chain(stripped.output_schema.items.iter_mut())
        {
            if let Some(values) = item.values.as_mut() {
                values.clear();
            }
        }
        let body = serde_json::to_string(&stripped)
            .map_err(|e| VigilError::write(model_id, "serializing metadata", e))?;
        Ok(Self {
            model_id: model_id.to_string(),
            body,
        })
    }

    fn into_metadata(self) -> VigilResult<StorageMetadata> {
        serde_json::from_str(&self.body)
            .map_err(|e| VigilError::read(&self.model_id, "parsing metadata", e))
    }
}

pub struct RelationalBackend {
    conn: Mutex<Connection>,
}

impl RelationalBackend {
    pub fn open(path: &Path) -> VigilResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            VigilError::Configuration(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> VigilResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VigilError::Configuration(format!("Failed to open sqlite: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> VigilResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| VigilError::Configuration(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn key_exists(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT 1 FROM store_keys WHERE store_key = ?1",
            params![key],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
    }

    fn require_key(conn: &Connection, key: &str, operation: &str) -> VigilResult<()> {
        match Self::key_exists(conn, key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VigilError::read(key, operation, "no rows stored")),
            Err(e) => Err(VigilError::read(key, operation, e)),
        }
    }

    fn query_bodies(
        conn: &Connection,
        sql: &str,
        args: Vec<SqlValue>,
    ) -> rusqlite::Result<Vec<Vec<u8>>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| row.get(0))?;
        rows.collect()
    }

    fn insert_rows(
        tx: &Transaction<'_>,
        key: &str,
        first_seq: i64,
        bytes: &[u8],
    ) -> rusqlite::Result<usize> {
        let rows = split_rows(bytes);
        for (offset, body) in rows.iter().enumerate() {
            StoredRow {
                store_key: key.to_string(),
                seq: first_seq + offset as i64,
                body: body.to_vec(),
            }
            .insert(tx)?;
        }
        Ok(rows.len())
    }

    fn bump_generation(tx: &Transaction<'_>, key: &str) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO store_keys (store_key, generation) VALUES (?1, 1)
             ON CONFLICT(store_key) DO UPDATE SET generation = generation + 1",
            params![key],
        )?;
        Ok(())
    }

    /// Every row of `key` with its sequence number
    pub fn stored_rows(&self, key: &str) -> VigilResult<Vec<StoredRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT store_key, seq, body FROM store_rows WHERE store_key = ?1 ORDER BY seq",
            )
            .map_err(|e| VigilError::read(key, "reading rows", e))?;
        let rows = stmt
            .query_map(params![key], StoredRow::from_sql)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| VigilError::read(key, "reading rows", e))?;
        Ok(rows)
    }

    fn load_enumerations(
        conn: &Connection,
        metadata: &mut StorageMetadata,
    ) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare(
            "SELECT role, column_name, value FROM column_values WHERE model_id = ?1",
        )?;
        let rows = stmt.query_map(params![metadata.model_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        for row in rows {
            let (role, column, value) = row?;
            let schema: &mut Schema = if role == "input" {
                &mut metadata.input_schema
            } else {
                &mut metadata.output_schema
            };
            if let Some(values) = schema
                .items
                .iter_mut()
                .find(|item| item.name == column)
                .and_then(|item| item.values.as_mut())
            {
                values.insert(value);
            }
        }
        Ok(())
    }

    fn save_enumerations(
        tx: &Transaction<'_>,
        model_id: &str,
        role: &str,
        schema: &Schema,
    ) -> rusqlite::Result<()> {
        for item in &schema.items {
            let Some(values) = &item.values else { continue };
            for value in values {
                tx.execute(
                    "INSERT OR IGNORE INTO column_values (model_id, role, column_name, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![model_id, role, item.name, value],
                )?;
            }
        }
        Ok(())
    }
}

impl StorageBackend for RelationalBackend {
    fn name(&self) -> &'static str {
        "relational"
    }

    fn try_exists(&self, key: &str) -> VigilResult<bool> {
        let conn = self.conn.lock();
        Self::key_exists(&conn, key).map_err(|e| VigilError::read(key, "checking rows", e))
    }

    fn read(&self, key: &str) -> VigilResult<Vec<u8>> {
        let conn = self.conn.lock();
        Self::require_key(&conn, key, "reading rows")?;
        let bodies = Self::query_bodies(
            &conn,
            "SELECT body FROM store_rows WHERE store_key = ?1 ORDER BY seq",
            vec![SqlValue::Text(key.to_string())],
        )
        .map_err(|e| VigilError::read(key, "reading rows", e))?;
        Ok(join_rows(bodies.iter().map(Vec::as_slice)))
    }

    fn read_last(&self, key: &str, n: usize) -> VigilResult<Vec<u8>> {
        let conn = self.conn.lock();
        Self::require_key(&conn, key, "reading batch")?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut bodies = Self::query_bodies(
            &conn,
            "SELECT body FROM store_rows WHERE store_key = ?1 ORDER BY seq DESC LIMIT ?2",
            vec![SqlValue::Text(key.to_string()), SqlValue::Integer(n as i64)],
        )
        .map_err(|e| VigilError::read(key, "reading batch", e))?;
        bodies.reverse();
        Ok(join_rows(bodies.iter().map(Vec::as_slice)))
    }

    fn read_range(&self, key: &str, start: usize, end: usize) -> VigilResult<Vec<u8>> {
        check_range(key, start, end)?;
        let conn = self.conn.lock();
        Self::require_key(&conn, key, "reading range")?;
        let bodies = Self::query_bodies(
            &conn,
            "SELECT body FROM store_rows WHERE store_key = ?1 ORDER BY seq LIMIT ?2 OFFSET ?3",
            vec![
                SqlValue::Text(key.to_string()),
                SqlValue::Integer((end - start) as i64),
                SqlValue::Integer(start as i64),
            ],
        )
        .map_err(|e| VigilError::read(key, "reading range", e))?;
        Ok(join_rows(bodies.iter().map(Vec::as_slice)))
    }

    fn replace(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        let mut conn = self.conn.lock();
        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM store_rows WHERE store_key = ?1", params![key])?;
            tx.execute("DELETE FROM row_tags WHERE store_key = ?1", params![key])?;
            let count = Self::insert_rows(&tx, key, 0, bytes)?;
            Self::bump_generation(&tx, key)?;
            tx.commit()?;
            Ok(count)
        })();
        let count = result.map_err(|e| VigilError::write(key, "replacing rows", e))?;
        debug!("Replaced {} with {} rows", key, count);
        Ok(())
    }

    fn append(&self, key: &str, bytes: &[u8]) -> VigilResult<()> {
        let mut conn = self.conn.lock();
        match Self::key_exists(&conn, key) {
            Ok(true) => {}
            Ok(false) => {
                return Err(VigilError::write(key, "appending", "destination does not exist"))
            }
            Err(e) => return Err(VigilError::write(key, "appending", e)),
        }

        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            let next: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM store_rows WHERE store_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            let count = Self::insert_rows(&tx, key, next, bytes)?;
            Self::bump_generation(&tx, key)?;
            tx.commit()?;
            Ok(count)
        })();
        let count = result.map_err(|e| VigilError::write(key, "appending rows", e))?;
        debug!("Appended {} rows to {}", count, key);
        Ok(())
    }

    fn last_modified(&self, key: &str) -> VigilResult<Version> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT generation FROM store_keys WHERE store_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| VigilError::read(key, "reading version", e))?
        .map(Version::Generation)
        .ok_or_else(|| VigilError::read(key, "reading version", "no rows stored"))
    }

    fn list_keys(&self) -> VigilResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT store_key FROM store_keys ORDER BY store_key")
            .map_err(|e| VigilError::Read(format!("Error listing keys: {}", e)))?;
        let keys = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
            .map_err(|e| VigilError::Read(format!("Error listing keys: {}", e)))?;
        Ok(keys)
    }

    fn read_tag_filtered(
        &self,
        data_key: &str,
        internal_key: &str,
        filter: &TagFilter,
        limit: Option<usize>,
    ) -> VigilResult<(Vec<u8>, Vec<u8>)> {
        if limit == Some(0) {
            return Ok((Vec::new(), Vec::new()));
        }
        let conn = self.conn.lock();
        Self::require_key(&conn, data_key, "reading tagged rows")?;
        Self::require_key(&conn, internal_key, "reading tagged rows")?;

        let placeholders: Vec<String> = (0..filter.tags.len())
            .map(|i| format!("?{}", i + 4))
            .collect();
        let sql = format!(
            "SELECT d.body, i.body FROM store_rows i
             JOIN store_rows d ON d.store_key = ?1 AND d.seq = i.seq
             WHERE i.store_key = ?2 AND {} EXISTS (
                 SELECT 1 FROM row_tags t
                 WHERE t.store_key = i.store_key AND t.seq = i.seq AND t.tag IN ({})
             )
             ORDER BY i.seq DESC LIMIT ?3",
            if filter.exclude { "NOT" } else { "" },
            placeholders.join(", ")
        );

        let mut args = vec![
            SqlValue::Text(data_key.to_string()),
            SqlValue::Text(internal_key.to_string()),
            // sqlite treats a negative limit as no limit
            SqlValue::Integer(limit.map_or(-1, |n| n as i64)),
        ];
        args.extend(filter.tags.iter().cloned().map(SqlValue::Text));

        let result = (|| -> rusqlite::Result<Vec<(Vec<u8>, Vec<u8>)>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })();
        let mut pairs = result.map_err(|e| VigilError::read(data_key, "reading tagged rows", e))?;
        pairs.reverse();

        Ok((
            join_rows(pairs.iter().map(|(d, _)| d.as_slice())),
            join_rows(pairs.iter().map(|(_, i)| i.as_slice())),
        ))
    }
}

impl MetadataStore for RelationalBackend {
    fn get(&self, model_id: &str, load_column_enumerations: bool) -> VigilResult<StorageMetadata> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT model_id, body FROM model_metadata WHERE model_id = ?1",
                params![model_id],
                |row| {
                    Ok(MetadataRecord {
                        model_id: row.get(0)?,
                        body: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| VigilError::read(model_id, "reading metadata", e))?
            .ok_or_else(|| VigilError::read(model_id, "reading metadata", "no metadata stored"))?;

        let mut metadata = record.into_metadata()?;
        if load_column_enumerations {
            Self::load_enumerations(&conn, &mut metadata)
                .map_err(|e| VigilError::read(model_id, "reading column enumerations", e))?;
        }
        Ok(metadata)
    }

    fn save(&self, metadata: &StorageMetadata, model_id: &str) -> VigilResult<()> {
        let record = MetadataRecord::from_metadata(metadata, model_id)?;
        let mut conn = self.conn.lock();
        let result = (|| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO model_metadata (model_id, body) VALUES (?1, ?2)
                 ON CONFLICT(model_id) DO UPDATE SET body = excluded.body",
                params![record.model_id, record.body],
            )?;
            tx.execute("DELETE FROM column_values WHERE model_id = ?1", params![model_id])?;
            Self::save_enumerations(&tx, model_id, "input", &metadata.input_schema)?;
            Self::save_enumerations(&tx, model_id, "output", &metadata.output_schema)?;
            tx.commit()
        })();
        result.map_err(|e| VigilError::write(model_id, "saving metadata", e))
    }

    fn try_exists(&self, model_id: &str) -> VigilResult<bool> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT 1 FROM model_metadata WHERE model_id = ?1",
            params![model_id],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| VigilError::read(model_id, "checking metadata", e))
    }

    fn list_models(&self) -> VigilResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT model_id FROM model_metadata ORDER BY model_id")
            .map_err(|e| VigilError::Read(format!("Error listing models: {}", e)))?;
        let models = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
            .map_err(|e| VigilError::Read(format!("Error listing models: {}", e)))?;
        Ok(models)
    }
}

impl RelationalBackend {
    /// Distinct tags stored for an internal data key
    pub fn tags_of(&self, internal_key: &str) -> VigilResult<BTreeSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT tag FROM row_tags WHERE store_key = ?1")
            .map_err(|e| VigilError::read(internal_key, "reading tags", e))?;
        let tags = stmt
            .query_map(params![internal_key], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<BTreeSet<String>>>())
            .map_err(|e| VigilError::read(internal_key, "reading tags", e))?;
        Ok(tags)
    }
}
