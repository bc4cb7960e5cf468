use std::path::PathBuf;

use clap::Parser;

/// Air Quality Tracker CLI arguments
#[derive(Debug, Default, Parser)]
#[command(
    name = "air-quality-tracker",
    version,
    about = "Periodic air-quality and temperature ingestion with alerting"
)]
pub struct Cli {
    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Ingestion interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Run a single ingestion cycle, print its summary and exit
    #[arg(long)]
    pub once: bool,

    /// JSON file of locations to add before ingesting
    #[arg(long)]
    pub locations: Option<PathBuf>,
}
