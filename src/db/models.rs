use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Stored result of one successfully submitted row.
///
/// The provenance fields (source_key, content_hash, run_id) tie the record
/// back to the uploaded file and the run that processed it; dedup and the
/// progress reconciler query on them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PersistedRecord {
    pub id: String,
    pub model: String,
    pub identity_value: Option<String>,
    pub fields: serde_json::Value,
    pub source_key: String,
    pub content_hash: String,
    pub run_id: String,
    pub processed_at: DateTime<Utc>,
}
