use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::db::PgRecordStore;
use crate::graphql::{GraphQlClient, SubmissionClient};
use crate::models::ModelRegistry;
use crate::pipeline::{self, mapper, validator, CsvProcessor};
use crate::storage::{FsObjectStore, ObjectStore};

#[derive(Parser)]
#[command(name = "onboarder", about = "CSV data onboarding service", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server and processing workers (default)
    Serve,
    /// List the registered record models
    ListModels,
    /// Validate or submit a local CSV file through the same pipeline the
    /// server runs
    Ingest {
        /// Path to the CSV file
        #[arg(long)]
        file: PathBuf,
        /// Model to use; auto-detected when omitted
        #[arg(long)]
        model: Option<String>,
        /// Run validation only, submit nothing
        #[arg(long)]
        dry_run: bool,
        /// Submit valid rows to the write API
        #[arg(long, conflicts_with = "dry_run")]
        submit: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn list_models() {
    let registry = ModelRegistry::new();
    println!("Available models:");
    for name in registry.model_names() {
        println!("  - {name}");
    }
}

pub async fn ingest(
    file: PathBuf,
    model_name: Option<String>,
    dry_run: bool,
    submit: bool,
) -> CliResult {
    let registry = ModelRegistry::new();
    let bytes = std::fs::read(&file)?;
    let (headers, rows) = pipeline::read_rows(&bytes)?;

    println!("Loaded {} ({} rows)", file.display(), rows.len());
    println!("Columns: {}", headers.join(", "));

    let model = registry.validate(&headers, model_name.as_deref())?;
    let resolved_model = model.name;
    println!("Using model: {resolved_model}");

    if !dry_run && !submit {
        println!("Nothing to do; pass --dry-run or --submit");
        return Ok(());
    }

    if dry_run {
        let mut error_count = 0usize;
        for (index, raw) in rows.iter().enumerate() {
            let row = mapper::map(raw, model);
            let errors = validator::validate(&row, model);
            if !errors.is_empty() {
                error_count += 1;
                println!("Row {} errors:", index + 1);
                for error in errors {
                    println!("  - {error}");
                }
            }
        }
        if error_count == 0 {
            println!("All rows passed validation.");
        } else {
            println!("Validation completed with {error_count} row(s) containing errors.");
        }
        return Ok(());
    }

    // --submit: run the real pipeline against the configured collaborators
    let config = Config::from_env()?;
    let pool =
        crate::db::connection::get_connection(&config.database_url, config.max_db_connections)
            .await?;
    crate::db::migrations::run_migrations(&pool).await?;

    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.data_dir));
    let submitter = SubmissionClient::new(Arc::new(GraphQlClient::new(
        &config.graphql_url,
        &config.graphql_api_key,
    )));
    let processor = CsvProcessor::new(
        Arc::new(registry),
        objects.clone(),
        Arc::new(PgRecordStore::new(pool)),
        submitter,
        config.upload_bucket.clone(),
    );

    let source_key = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.csv".to_string());
    objects
        .put(&config.upload_bucket, &source_key, bytes, "text/csv")
        .await?;

    let run_id = format!("cli-{}", uuid::Uuid::new_v4());
    let outcome = processor
        .process(&source_key, &run_id, Some(resolved_model))
        .await;

    println!("{}", outcome.message);
    println!("  Successful: {}", outcome.successful_records);
    println!("  Failed:     {}", outcome.error_records);
    println!("  Total:      {}", outcome.records_processed);
    for error in &outcome.errors {
        println!("  - {error}");
    }

    if outcome.success {
        Ok(())
    } else {
        Err(outcome.message.into())
    }
}
