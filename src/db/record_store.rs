use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::db::models::PersistedRecord;
use crate::error::StorageError;

/// Persistence seam for processed records.
///
/// Lookups are keyed (content hash, identity value, source key) rather than
/// exposed as a generic scan, so backends can answer them from an index.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &PersistedRecord) -> Result<(), StorageError>;

    /// Has any record been persisted from a file with these exact bytes?
    async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StorageError>;

    /// Does a record of this model with this identity value already exist?
    async fn identity_exists(&self, model: &str, value: &str) -> Result<bool, StorageError>;

    /// Number of records whose provenance points at this source key.
    async fn count_for_source(&self, source_key: &str) -> Result<u64, StorageError>;
}

/// Postgres-backed record store.
pub struct PgRecordStore {
    pool: Pool<Postgres>,
}

impl PgRecordStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        debug!(id = %record.id, model = %record.model, "persisting record");

        sqlx::query(
            r#"
            INSERT INTO persisted_records
                (id, model, identity_value, fields, source_key, content_hash, run_id, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.model)
        .bind(&record.identity_value)
        .bind(&record.fields)
        .bind(&record.source_key)
        .bind(&record.content_hash)
        .bind(&record.run_id)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM persisted_records WHERE content_hash = $1)",
        )
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn identity_exists(&self, model: &str, value: &str) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM persisted_records WHERE model = $1 AND identity_value = $2)",
        )
        .bind(model)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_for_source(&self, source_key: &str) -> Result<u64, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM persisted_records WHERE source_key = $1")
                .bind(source_key)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

/// In-memory record store, used by tests and the CLI dry paths. Maintains
/// the same indexes the Postgres schema does.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<MemoryIndexes>,
}

#[derive(Default)]
struct MemoryIndexes {
    records: Vec<PersistedRecord>,
    hashes: HashSet<String>,
    identities: HashSet<(String, String)>,
    by_source: HashMap<String, u64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.inner.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.hashes.insert(record.content_hash.clone());
        if let Some(value) = &record.identity_value {
            inner.identities.insert((record.model.clone(), value.clone()));
        }
        *inner.by_source.entry(record.source_key.clone()).or_insert(0) += 1;
        inner.records.push(record.clone());
        Ok(())
    }

    async fn content_hash_exists(&self, content_hash: &str) -> Result<bool, StorageError> {
        Ok(self.inner.lock().unwrap().hashes.contains(content_hash))
    }

    async fn identity_exists(&self, model: &str, value: &str) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .identities
            .contains(&(model.to_string(), value.to_string())))
    }

    async fn count_for_source(&self, source_key: &str) -> Result<u64, StorageError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .by_source
            .get(source_key)
            .copied()
            .unwrap_or(0))
    }
}
