//! Persistent OID → `ObjectRecord` mapping.
//!
//! The table is append-only: a record for an OID is written once and never
//! overwritten. `insert` is idempotent — when a record already exists for
//! the OID, the existing record wins and is returned, which is also how
//! concurrent first-uploads of identical content collapse to one entry.
//!
//! Two interchangeable backends satisfy the contract: SQLite for durable
//! deployments and a single JSON file for development setups.

use crate::models::{oid::Oid, record::ObjectRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::Mutex,
};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("stored record for `{oid}` is corrupt: {reason}")]
    Corrupt { oid: String, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type MappingResult<T> = Result<T, MappingError>;

#[derive(Clone, Debug, Default)]
pub struct ListRecordsParams {
    /// Filter on the start of `logical_path`.
    pub prefix: Option<String>,
    /// Resume after this OID (exclusive), in OID order.
    pub after: Option<String>,
    pub limit: usize,
}

#[derive(Debug)]
pub struct ListRecordsResult {
    pub records: Vec<ObjectRecord>,
    pub is_truncated: bool,
    /// OID cursor for the next page when truncated.
    pub next_cursor: Option<String>,
}

/// The mapping-table contract. Pure data access; no protocol knowledge.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn lookup(&self, oid: &Oid) -> MappingResult<Option<ObjectRecord>>;

    /// Append a record. If one already exists for the OID this is a no-op
    /// success and the durable record is returned.
    async fn insert(&self, record: ObjectRecord) -> MappingResult<ObjectRecord>;

    /// Page through records in OID order, optionally filtered by
    /// logical-path prefix.
    async fn list(&self, params: ListRecordsParams) -> MappingResult<ListRecordsResult>;

    /// Cheap readiness check against the backing storage.
    async fn probe(&self) -> MappingResult<()>;
}

// ---------------------------------------------------------------------------
// SQLite backend

#[derive(FromRow)]
struct RecordRow {
    oid: String,
    logical_path: String,
    version_token: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for ObjectRecord {
    type Error = MappingError;

    fn try_from(row: RecordRow) -> MappingResult<ObjectRecord> {
        let oid = Oid::from_hex(&row.oid).map_err(|e| MappingError::Corrupt {
            oid: row.oid.clone(),
            reason: e.to_string(),
        })?;
        Ok(ObjectRecord {
            oid,
            logical_path: row.logical_path,
            version_token: row.version_token,
            size: row.size_bytes,
            created_at: row.created_at,
        })
    }
}

/// Mapping table in SQLite. `lfs_objects.oid` is the primary key, so the
/// append-once invariant is enforced by the database itself.
pub struct SqliteMappingStore {
    db: Arc<SqlitePool>,
}

impl SqliteMappingStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn fetch(&self, oid_hex: &str) -> MappingResult<Option<ObjectRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT oid, logical_path, version_token, size_bytes, created_at
             FROM lfs_objects WHERE oid = ?",
        )
        .bind(oid_hex)
        .fetch_optional(&*self.db)
        .await?;
        row.map(ObjectRecord::try_from).transpose()
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn lookup(&self, oid: &Oid) -> MappingResult<Option<ObjectRecord>> {
        self.fetch(&oid.to_hex()).await
    }

    async fn insert(&self, record: ObjectRecord) -> MappingResult<ObjectRecord> {
        let oid_hex = record.oid.to_hex();
        sqlx::query(
            "INSERT INTO lfs_objects (oid, logical_path, version_token, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(oid) DO NOTHING",
        )
        .bind(&oid_hex)
        .bind(&record.logical_path)
        .bind(&record.version_token)
        .bind(record.size)
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;

        // Re-read so the caller always sees the winning record, whether it
        // was ours or a concurrent writer's.
        self.fetch(&oid_hex)
            .await?
            .ok_or_else(|| MappingError::Corrupt {
                oid: oid_hex,
                reason: "record vanished after insert".into(),
            })
    }

    async fn list(&self, params: ListRecordsParams) -> MappingResult<ListRecordsResult> {
        let limit = params.limit.clamp(1, 1000);
        let fetch_limit = limit + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT oid, logical_path, version_token, size_bytes, created_at \
             FROM lfs_objects WHERE 1 = 1",
        );
        if let Some(prefix) = &params.prefix {
            builder.push(" AND logical_path LIKE ");
            builder.push_bind(format!("{}%", prefix));
        }
        if let Some(after) = &params.after {
            builder.push(" AND oid > ");
            builder.push_bind(after);
        }
        builder.push(" ORDER BY oid ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&*self.db).await?;

        // The extra row only signals truncation; the cursor must point at
        // the last row actually returned, since `after` is exclusive.
        let mut is_truncated = false;
        let mut next_cursor = None;
        if rows.len() == fetch_limit {
            rows.pop();
            next_cursor = rows.last().map(|row| row.oid.clone());
            is_truncated = true;
        }

        let records = rows
            .into_iter()
            .map(ObjectRecord::try_from)
            .collect::<MappingResult<Vec<_>>>()?;

        Ok(ListRecordsResult {
            records,
            is_truncated,
            next_cursor,
        })
    }

    async fn probe(&self) -> MappingResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON-file backend

/// Development mapping store: one JSON file holding the whole table, keyed
/// by OID hex. Writers hold a process-wide lock and replace the file with a
/// fsynced temp-and-rename, so a reader never observes a torn table.
pub struct JsonMappingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> MappingResult<BTreeMap<String, ObjectRecord>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn persist(&self, table: &BTreeMap<String, ObjectRecord>) -> MappingResult<()> {
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let payload = serde_json::to_vec_pretty(table)?;

        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = async {
            file.write_all(&payload).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await
        {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl MappingStore for JsonMappingStore {
    async fn lookup(&self, oid: &Oid) -> MappingResult<Option<ObjectRecord>> {
        Ok(self.load().await?.remove(&oid.to_hex()))
    }

    async fn insert(&self, record: ObjectRecord) -> MappingResult<ObjectRecord> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load().await?;
        let key = record.oid.to_hex();
        if let Some(existing) = table.get(&key) {
            return Ok(existing.clone());
        }
        table.insert(key, record.clone());
        self.persist(&table).await?;
        Ok(record)
    }

    async fn list(&self, params: ListRecordsParams) -> MappingResult<ListRecordsResult> {
        let limit = params.limit.clamp(1, 1000);
        let fetch_limit = limit + 1;
        let table = self.load().await?;

        let mut records: Vec<ObjectRecord> = table
            .into_iter()
            .filter(|(oid_hex, _)| match &params.after {
                Some(after) => oid_hex.as_str() > after.as_str(),
                None => true,
            })
            .filter(|(_, record)| match &params.prefix {
                Some(prefix) => record.logical_path.starts_with(prefix),
                None => true,
            })
            .map(|(_, record)| record)
            .take(fetch_limit)
            .collect();

        // As with the SQLite backend: drop the sentinel, cursor on the last
        // returned record.
        let mut is_truncated = false;
        let mut next_cursor = None;
        if records.len() == fetch_limit {
            records.pop();
            next_cursor = records.last().map(|record| record.oid.to_hex());
            is_truncated = true;
        }

        Ok(ListRecordsResult {
            records,
            is_truncated,
            next_cursor,
        })
    }

    async fn probe(&self) -> MappingResult<()> {
        self.load().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(content: &[u8], path: &str, token: &str) -> ObjectRecord {
        ObjectRecord {
            oid: Oid::from_content(content),
            logical_path: path.to_string(),
            version_token: token.to_string(),
            size: content.len() as i64,
            created_at: Utc::now(),
        }
    }

    fn json_store(dir: &tempfile::TempDir) -> JsonMappingStore {
        JsonMappingStore::new(dir.path().join("mappings.json"))
    }

    #[tokio::test]
    async fn json_insert_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(&dir);
        let rec = record(b"alpha", "repo/assets/model.bin", "v1");

        assert!(store.lookup(&rec.oid).await.unwrap().is_none());
        store.insert(rec.clone()).await.unwrap();
        assert_eq!(store.lookup(&rec.oid).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn json_insert_is_idempotent_and_first_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(&dir);
        let first = record(b"alpha", "repo/assets/model.bin", "v1");
        let second = record(b"alpha", "repo/other/path.bin", "v2");

        store.insert(first.clone()).await.unwrap();
        let winner = store.insert(second).await.unwrap();
        assert_eq!(winner, first);
        assert_eq!(store.lookup(&first.oid).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn json_table_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let rec = record(b"persist me", "repo/data/blob", "v1");
        json_store(&dir).insert(rec.clone()).await.unwrap();

        let reopened = json_store(&dir);
        assert_eq!(reopened.lookup(&rec.oid).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn json_concurrent_inserts_leave_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(json_store(&dir));
        let a = record(b"same bytes", "repo/path/a", "va");
        let b = record(b"same bytes", "repo/path/b", "vb");

        let (ra, rb) = tokio::join!(store.insert(a.clone()), store.insert(b.clone()));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_eq!(ra, rb);

        let listed = store.list(ListRecordsParams::default()).await.unwrap();
        assert_eq!(listed.records.len(), 1);
    }

    #[tokio::test]
    async fn json_list_paginates_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(&dir);
        for i in 0..5u8 {
            store
                .insert(record(&[i], "repo/tracked/file", &format!("v{}", i)))
                .await
                .unwrap();
        }
        store
            .insert(record(b"elsewhere", "other/file", "v9"))
            .await
            .unwrap();

        let page1 = store
            .list(ListRecordsParams {
                prefix: Some("repo/".into()),
                after: None,
                limit: 3,
            })
            .await
            .unwrap();
        assert_eq!(page1.records.len(), 3);
        assert!(page1.is_truncated);

        let page2 = store
            .list(ListRecordsParams {
                prefix: Some("repo/".into()),
                after: page1.next_cursor,
                limit: 3,
            })
            .await
            .unwrap();
        assert_eq!(page2.records.len(), 2);
        assert!(!page2.is_truncated);
        assert!(page2.next_cursor.is_none());
    }

    async fn sqlite_store() -> SqliteMappingStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        SqliteMappingStore::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn sqlite_insert_lookup_and_idempotency() {
        let store = sqlite_store().await;
        let first = record(b"alpha", "repo/assets/model.bin", "v1");
        let clash = record(b"alpha", "repo/other", "v2");

        assert!(store.lookup(&first.oid).await.unwrap().is_none());
        let inserted = store.insert(first.clone()).await.unwrap();
        assert_eq!(inserted.oid, first.oid);
        assert_eq!(inserted.logical_path, first.logical_path);
        assert_eq!(inserted.version_token, first.version_token);
        assert_eq!(inserted.size, first.size);

        let winner = store.insert(clash).await.unwrap();
        assert_eq!(winner.logical_path, first.logical_path);
        assert_eq!(winner.version_token, first.version_token);

        let found = store.lookup(&first.oid).await.unwrap().unwrap();
        assert_eq!(found.logical_path, first.logical_path);
    }

    #[tokio::test]
    async fn sqlite_list_pages_in_oid_order() {
        let store = sqlite_store().await;
        for i in 0..4u8 {
            store
                .insert(record(&[i, i], "repo/f", &format!("v{}", i)))
                .await
                .unwrap();
        }

        let page1 = store
            .list(ListRecordsParams {
                prefix: None,
                after: None,
                limit: 3,
            })
            .await
            .unwrap();
        assert_eq!(page1.records.len(), 3);
        assert!(page1.is_truncated);
        let mut oids: Vec<String> = page1.records.iter().map(|r| r.oid.to_hex()).collect();
        let mut sorted = oids.clone();
        sorted.sort();
        assert_eq!(oids, sorted);

        let page2 = store
            .list(ListRecordsParams {
                prefix: None,
                after: page1.next_cursor,
                limit: 3,
            })
            .await
            .unwrap();
        assert_eq!(page2.records.len(), 1);
        oids.extend(page2.records.iter().map(|r| r.oid.to_hex()));
        oids.sort();
        oids.dedup();
        assert_eq!(oids.len(), 4);
    }
}
