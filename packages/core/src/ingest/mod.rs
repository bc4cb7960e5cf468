//! Air-quality ingestion
//!
//! Fetches pollution and weather readings per location, classifies them,
//! raises alerts and persists the results, one cycle at a time.

pub mod alerts;
pub mod classifier;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod types;

pub use alerts::generate_alerts;
pub use classifier::classify;
pub use config::{AlertThresholds, Breakpoints, IngestConfig};
pub use error::{FetchError, IngestError, LocationError};
pub use orchestrator::{Orchestrator, ProviderCredentials};
pub use source::{PollutionSource, WeatherSource};
pub use types::*;
