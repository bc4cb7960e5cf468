//! Error types for ingestion operations

use thiserror::Error;

/// Errors that abort a whole ingestion cycle.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IngestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

/// Errors that fail a single location without touching the rest of the cycle.
#[derive(Error, Debug)]
pub enum LocationError {
    #[error("no pollution data")]
    NoPollutionData,

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

/// Errors from pollution and weather sources. The ingestion cycle treats all
/// of them as "no data" for that provider and location.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Data format error: {message}")]
    Format { message: String },

    #[error("No data: {reason}")]
    NoData { reason: String },
}

impl FetchError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }

    pub fn no_data(reason: impl Into<String>) -> Self {
        Self::NoData { reason: reason.into() }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::format(err.to_string())
        } else {
            FetchError::Network { message: err.to_string() }
        }
    }
}
