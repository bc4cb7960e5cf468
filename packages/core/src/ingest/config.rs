//! Configuration for the ingestion cycle

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between two locations, sized to stay under the weather provider's
/// free-tier limit of 60 requests per minute.
pub const DEFAULT_INTER_LOCATION_DELAY: Duration = Duration::from_millis(1100);

/// Configuration for one ingestion cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub inter_location_delay: Duration,
    pub breakpoints: Breakpoints,
    pub alert_thresholds: AlertThresholds,
}

/// Inclusive upper bounds of the first five AQI bands. Anything above
/// `very_unhealthy` is hazardous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoints {
    pub good: i32,
    pub moderate: i32,
    pub unhealthy_sensitive: i32,
    pub unhealthy: i32,
    pub very_unhealthy: i32,
}

/// Strict thresholds for the alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Index above this raises a critical spike.
    pub index_critical: i32,
    /// Index above this raises a high spike.
    pub index_high: i32,
    /// Index above this raises a health advisory.
    pub index_advisory: i32,
    /// Temperature (°C) above this raises a critical heat alert.
    pub heat_critical: f64,
    /// Temperature (°C) below this raises a high cold alert.
    pub cold_high: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            inter_location_delay: DEFAULT_INTER_LOCATION_DELAY,
            breakpoints: Breakpoints::default(),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            good: 50,
            moderate: 100,
            unhealthy_sensitive: 150,
            unhealthy: 200,
            very_unhealthy: 300,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            index_critical: 300,
            index_high: 200,
            index_advisory: 150,
            heat_critical: 45.0,
            cold_high: -15.0,
        }
    }
}
