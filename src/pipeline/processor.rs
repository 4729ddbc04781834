use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{PersistedRecord, RecordStore};
use crate::error::PipelineError;
use crate::graphql::SubmissionClient;
use crate::models::ModelRegistry;
use crate::pipeline::dedup::{content_hash, identity_value, Deduplicator};
use crate::pipeline::{mapper, read_rows, validator};
use crate::storage::ObjectStore;

/// Structured result of processing one uploaded file. Row-level problems are
/// accumulated here; `success` is false only for fatal per-file failures.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub records_processed: u64,
    pub successful_records: u64,
    pub error_records: u64,
    pub errors: Vec<String>,
    pub model: Option<String>,
    pub content_hash: Option<String>,
    pub message: String,
}

impl ProcessOutcome {
    fn already_processed(hash: String) -> Self {
        Self {
            success: true,
            records_processed: 0,
            successful_records: 0,
            error_records: 0,
            errors: vec![],
            model: None,
            content_hash: Some(hash),
            message: "File content already processed".to_string(),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            records_processed: 0,
            successful_records: 0,
            error_records: 0,
            errors: vec![message.clone()],
            model: None,
            content_hash: None,
            message,
        }
    }
}

/// Runs the per-file pipeline: fetch bytes, file-level dedup, model
/// resolution, then map -> validate -> row-dedup -> submit -> persist for
/// every row strictly in file order. Finished files move under `processed/`,
/// fatally failed ones under `failed/`.
pub struct CsvProcessor {
    registry: Arc<ModelRegistry>,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    dedup: Deduplicator,
    submitter: SubmissionClient,
    bucket: String,
}

impl CsvProcessor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        submitter: SubmissionClient,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            objects,
            records: records.clone(),
            dedup: Deduplicator::new(records),
            submitter,
            bucket: bucket.into(),
        }
    }

    /// Process one uploaded object. Never returns `Err`: fatal failures are
    /// folded into a failed outcome after moving the file aside.
    pub async fn process(
        &self,
        source_key: &str,
        run_id: &str,
        model_name: Option<&str>,
    ) -> ProcessOutcome {
        match self.run(source_key, run_id, model_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(source_key, run_id, error = %e, "processing failed");
                self.move_object(source_key, "failed").await;
                ProcessOutcome::failed(format!("Job failed: {e}"))
            }
        }
    }

    async fn run(
        &self,
        source_key: &str,
        run_id: &str,
        model_name: Option<&str>,
    ) -> Result<ProcessOutcome, PipelineError> {
        let bytes = self.objects.get(&self.bucket, source_key).await?;
        let hash = content_hash(&bytes);

        if self.dedup.file_already_processed(&hash).await? {
            warn!(source_key, %hash, "file content already processed, skipping");
            return Ok(ProcessOutcome::already_processed(hash));
        }

        let (headers, rows) = read_rows(&bytes)?;
        let model = self.registry.validate(&headers, model_name)?;
        info!(source_key, model = model.name, rows = rows.len(), "processing file");

        let mut successful: u64 = 0;
        let mut failed: u64 = 0;
        let mut errors: Vec<String> = Vec::new();

        for (index, raw) in rows.iter().enumerate() {
            let line = index + 1;
            let row = mapper::map(raw, model);

            let row_errors = validator::validate(&row, model);
            if !row_errors.is_empty() {
                failed += 1;
                errors.extend(row_errors.into_iter().map(|e| format!("Row {line}: {e}")));
                continue;
            }

            match self.dedup.duplicate_identity(model, &row).await? {
                Some(value) => {
                    warn!(source_key, line, value = %value, "duplicate row skipped");
                    failed += 1;
                    errors.push(format!(
                        "Row {line}: Duplicate {} '{value}'",
                        model.identity_field.unwrap_or("identity")
                    ));
                    continue;
                }
                None => {}
            }

            let created = match self.submitter.submit(model, &row).await {
                Ok(created) => created,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("Row {line}: {e}"));
                    continue;
                }
            };

            let record = self.build_record(model, &row, created, source_key, &hash, run_id);
            if let Err(e) = self.records.insert(&record).await {
                failed += 1;
                errors.push(format!("Row {line}: {e}"));
                continue;
            }
            successful += 1;
        }

        self.move_object(source_key, "processed").await;

        Ok(ProcessOutcome {
            success: true,
            records_processed: rows.len() as u64,
            successful_records: successful,
            error_records: failed,
            errors,
            model: Some(model.name.to_string()),
            content_hash: Some(hash),
            message: format!("Processing complete! {successful} records processed successfully."),
        })
    }

    fn build_record(
        &self,
        model: &crate::models::Model,
        row: &crate::pipeline::CanonicalRow,
        created: serde_json::Value,
        source_key: &str,
        hash: &str,
        run_id: &str,
    ) -> PersistedRecord {
        let id = created
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}_{}", model.name, Uuid::new_v4()));

        let mut fields = serde_json::Map::new();
        for spec in &model.schema {
            let value = row
                .get(spec.name)
                .and_then(|v| v.clone())
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
            fields.insert(spec.name.to_string(), value);
        }

        PersistedRecord {
            id,
            model: model.name.to_string(),
            identity_value: identity_value(model, row),
            fields: serde_json::Value::Object(fields),
            source_key: source_key.to_string(),
            content_hash: hash.to_string(),
            run_id: run_id.to_string(),
            processed_at: Utc::now(),
        }
    }

    // Best effort: a failed move never turns a finished run into a failure.
    async fn move_object(&self, source_key: &str, prefix: &str) {
        let destination = format!("{prefix}/{source_key}");
        if let Err(e) = self.objects.copy(&self.bucket, source_key, &destination).await {
            warn!(source_key, %destination, error = %e, "could not copy processed file");
            return;
        }
        if let Err(e) = self.objects.delete(&self.bucket, source_key).await {
            warn!(source_key, error = %e, "could not delete source file after copy");
        }
        info!(source_key, %destination, "moved file");
    }
}
