use actix_multipart::form::MultipartFormConfig;
use actix_web::{App, HttpServer, web};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

mod api;
mod cli;
mod config;
mod db;
mod error;
mod graphql;
mod models;
mod orchestrator;
mod pipeline;
mod progress;
mod runner;
mod shutdown;
mod storage;
mod worker;

use crate::api::{
    health::health_config, models::models_config, upload::upload_config, validation,
};
use crate::cli::{Cli, Command};
use crate::db::{PgRecordStore, RecordStore};
use crate::graphql::{GraphQlClient, SubmissionClient};
use crate::models::ModelRegistry;
use crate::orchestrator::JobOrchestrator;
use crate::pipeline::CsvProcessor;
use crate::progress::Reconciler;
use crate::runner::{JobRunner, LocalJobRunner};
use crate::shutdown::ShutdownCoordinator;
use crate::storage::{FsObjectStore, ObjectStore};
use crate::worker::{PendingQueue, PendingWorker};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::ListModels => {
            cli::list_models();
            Ok(())
        }
        Command::Ingest {
            file,
            model,
            dry_run,
            submit,
        } => cli::ingest(file, model, dry_run, submit)
            .await
            .map_err(|e| std::io::Error::other(e.to_string())),
    }
}

async fn serve() -> std::io::Result<()> {
    // Load configuration from environment; missing endpoints or credentials
    // are fatal here, before anything is started
    let config = config::Config::from_env().expect("Failed to load configuration");

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create logs directory");
    init_logging(&config.log_dir);

    info!("Starting onboarder");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Upload bucket: {}", config.upload_bucket);
    info!("  - Job name: {}", config.job_name);
    info!("  - Max concurrent runs: {}", config.max_concurrent_runs);
    info!("  - Max payload size: {} bytes", config.max_payload_size);

    let pool = db::connection::get_connection(&config.database_url, config.max_db_connections)
        .await
        .expect("Failed to connect to database");
    info!("Database connection pool established");

    // Auto-migrate on startup
    db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // Wire the pipeline: registry -> processor -> runner -> orchestrator
    let registry = web::Data::new(ModelRegistry::new());
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.data_dir));
    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
    let submitter = SubmissionClient::new(Arc::new(GraphQlClient::new(
        &config.graphql_url,
        &config.graphql_api_key,
    )));
    let processor = Arc::new(CsvProcessor::new(
        registry.clone().into_inner(),
        objects.clone(),
        records.clone(),
        submitter,
        config.upload_bucket.clone(),
    ));
    let job_runner: Arc<dyn JobRunner> = Arc::new(LocalJobRunner::new(
        config.job_name.clone(),
        processor,
        config.max_concurrent_runs,
    ));
    let pending_queue = PendingQueue::new();
    let job_orchestrator = web::Data::new(JobOrchestrator::new(
        objects,
        job_runner.clone(),
        pending_queue.clone(),
        config.upload_bucket.clone(),
        config.job_name.clone(),
    ));
    let reconciler = web::Data::new(Reconciler::new(
        job_runner.clone(),
        records,
        config.job_name.clone(),
    ));

    // Shutdown channel lets the pending worker finish cleanly
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker = PendingWorker::new(job_runner, pending_queue.clone());
    let worker_handle = tokio::spawn(worker.run(1, shutdown_rx));
    info!("Spawned pending-run worker");

    let server_pool = pool.clone();
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);
        let multipart_config = MultipartFormConfig::default().total_limit(max_payload_size);

        App::new()
            .app_data(web::Data::new(server_pool.clone()))
            .app_data(registry.clone())
            .app_data(job_orchestrator.clone())
            .app_data(reconciler.clone())
            .app_data(payload_config)
            .app_data(multipart_config)
            .app_data(validation::json_config())
            .configure(health_config)
            .configure(upload_config)
            .configure(models_config)
    });

    info!("Server starting on http://{}", config.bind_addr);

    let server = server.bind(config.bind_addr.as_str())?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        vec![worker_handle],
        shutdown_tx,
        pending_queue,
        pool,
    );

    coordinator.wait_for_shutdown().await
}

/// File-based logging with daily rotation and level separation, plus an ANSI
/// console layer. Files land as logs/info.<date>.log etc.
fn init_logging(log_dir: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();
}
