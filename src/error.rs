use thiserror::Error;

/// Startup configuration problems. These are fatal: the process refuses to
/// start rather than limp along with a missing endpoint or credential.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set in .env file or environment")]
    MissingVar(&'static str),

    #[error("invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Model detection failures. Reported before any row is touched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DetectionError {
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("CSV structure doesn't match model '{0}'")]
    ModelMismatch(String),

    #[error("No matching model found for CSV structure")]
    NoModelMatched,
}

/// Failures from the object store or the record store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
}

/// Fatal per-file pipeline failures. Row-level problems are accumulated as
/// strings in the process outcome and never surface through this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}
