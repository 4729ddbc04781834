use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::db::RecordStore;
use crate::error::StorageError;
use crate::models::{FieldType, Model};
use crate::pipeline::CanonicalRow;

/// Stable digest over raw uploaded bytes, used for file-level dedup.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The identity value a row would be deduplicated on, normalized the way it
/// is persisted: email-typed identity fields are case-folded, everything
/// else compares as-is.
pub fn identity_value(model: &Model, row: &CanonicalRow) -> Option<String> {
    let field_name = model.identity_field?;
    let value = row.get(field_name)?.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    let folded = match model.field(field_name).map(|f| f.field_type) {
        Some(FieldType::Email) => value.to_lowercase(),
        _ => value.to_string(),
    };
    Some(folded)
}

/// Two-tier at-most-once checks against already-persisted records.
pub struct Deduplicator {
    store: Arc<dyn RecordStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// File-level check: have these exact bytes produced records before?
    pub async fn file_already_processed(&self, hash: &str) -> Result<bool, StorageError> {
        self.store.content_hash_exists(hash).await
    }

    /// Row-level check: returns the normalized identity value when a record
    /// with it already exists, `None` when the row is new or the model has
    /// no identity field.
    pub async fn duplicate_identity(
        &self,
        model: &Model,
        row: &CanonicalRow,
    ) -> Result<Option<String>, StorageError> {
        let value = match identity_value(model, row) {
            Some(v) => v,
            None => return Ok(None),
        };
        if self.store.identity_exists(model.name, &value).await? {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRecordStore, PersistedRecord};
    use crate::models::{customer, project};
    use chrono::Utc;

    fn row(pairs: &[(&str, &str)]) -> CanonicalRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    fn persisted(model: &str, identity: &str, hash: &str) -> PersistedRecord {
        PersistedRecord {
            id: format!("{model}_{identity}"),
            model: model.to_string(),
            identity_value: Some(identity.to_string()),
            fields: serde_json::json!({}),
            source_key: "seed.csv".to_string(),
            content_hash: hash.to_string(),
            run_id: "run-0".to_string(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = content_hash(b"name,email\n");
        assert_eq!(a, content_hash(b"name,email\n"));
        assert_ne!(a, content_hash(b"name,email\r\n"));
    }

    #[test]
    fn email_identity_is_case_folded_but_names_are_not() {
        let c = customer::model();
        let value = identity_value(&c, &row(&[("email", "Ada@Example.COM")]));
        assert_eq!(value.as_deref(), Some("ada@example.com"));

        let p = project::model();
        let value = identity_value(&p, &row(&[("name", "Apollo Rework")]));
        assert_eq!(value.as_deref(), Some("Apollo Rework"));
    }

    #[tokio::test]
    async fn detects_duplicate_rows_across_case() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(&persisted("customer", "ada@example.com", "h1"))
            .await
            .unwrap();
        let dedup = Deduplicator::new(store);

        let model = customer::model();
        let dup = dedup
            .duplicate_identity(&model, &row(&[("email", "ADA@example.com")]))
            .await
            .unwrap();
        assert_eq!(dup.as_deref(), Some("ada@example.com"));

        let fresh = dedup
            .duplicate_identity(&model, &row(&[("email", "grace@example.com")]))
            .await
            .unwrap();
        assert!(fresh.is_none());
    }

    #[tokio::test]
    async fn file_level_check_matches_on_hash() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(&persisted("customer", "ada@example.com", content_hash(b"bytes").as_str()))
            .await
            .unwrap();
        let dedup = Deduplicator::new(store);

        assert!(dedup
            .file_already_processed(&content_hash(b"bytes"))
            .await
            .unwrap());
        assert!(!dedup
            .file_already_processed(&content_hash(b"other"))
            .await
            .unwrap());
    }
}
