// Library root. Exposes the ingestion pipeline to the binary in `src/main.rs`
// and to the integration tests in `tests/`.

pub mod api;
pub mod cache;
pub mod db;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod reads;
pub mod repository;
pub mod scheduler;
pub mod services;

// Startup plumbing used by the binary.
pub mod cli;
pub mod config;
pub mod logging;
