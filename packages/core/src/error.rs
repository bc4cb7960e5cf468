use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::IngestError;

/// Unified application error.
///
/// Everything the binary can fail on at startup or during a one-shot run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
