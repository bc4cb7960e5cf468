//! Core data types for air-quality ingestion

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a monitored location.
pub type LocationId = i64;

/// Provenance tag stored on every air-quality reading.
pub const POLLUTION_SOURCE_TAG: &str = "waqi-live";
/// Provenance tag stored on every temperature reading.
pub const WEATHER_SOURCE_TAG: &str = "openweathermap-live";

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// A monitored location as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub region: Option<String>,
    pub coordinates: Coordinates,
}

/// A location to be seeded into the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Ordinal air-quality band. Variants are declared from best to worst so the
/// derived `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthySensitive,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Canonical persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "GOOD",
            AqiCategory::Moderate => "MODERATE",
            AqiCategory::UnhealthySensitive => "UNHEALTHY_SENSITIVE",
            AqiCategory::Unhealthy => "UNHEALTHY",
            AqiCategory::VeryUnhealthy => "VERY_UNHEALTHY",
            AqiCategory::Hazardous => "HAZARDOUS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    pub fn health_advice(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory. Enjoy outdoor activities!",
            AqiCategory::Moderate => {
                "Air quality is acceptable. Unusually sensitive people should limit prolonged outdoor exertion."
            }
            AqiCategory::UnhealthySensitive => {
                "Members of sensitive groups may experience health effects. General public is less likely to be affected."
            }
            AqiCategory::Unhealthy => {
                "Everyone may begin to experience health effects. Sensitive groups may experience more serious effects."
            }
            AqiCategory::VeryUnhealthy => {
                "Health alert: everyone may experience more serious health effects. Avoid outdoor activities."
            }
            AqiCategory::Hazardous => {
                "Health warning of emergency conditions. The entire population is likely to be affected. Stay indoors!"
            }
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a persisted enum name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for AqiCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AqiCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// What kind of condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    IndexSpike,
    SustainedHigh,
    TemperatureExtreme,
    HealthAdvisory,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::IndexSpike => "INDEX_SPIKE",
            AlertKind::SustainedHigh => "SUSTAINED_HIGH",
            AlertKind::TemperatureExtreme => "TEMPERATURE_EXTREME",
            AlertKind::HealthAdvisory => "HEALTH_ADVISORY",
        }
    }
}

impl FromStr for AlertKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDEX_SPIKE" => Ok(AlertKind::IndexSpike),
            "SUSTAINED_HIGH" => Ok(AlertKind::SustainedHigh),
            "TEMPERATURE_EXTREME" => Ok(AlertKind::TemperatureExtreme),
            "HEALTH_ADVISORY" => Ok(AlertKind::HealthAdvisory),
            other => Err(UnknownVariant {
                kind: "alert kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Alert severity, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(AlertSeverity::Low),
            "MEDIUM" => Ok(AlertSeverity::Medium),
            "HIGH" => Ok(AlertSeverity::High),
            "CRITICAL" => Ok(AlertSeverity::Critical),
            other => Err(UnknownVariant {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// Individual pollutant concentrations. Each field is `None` unless the
/// provider reported it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

/// Point-in-time pollution reading returned by a pollution source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionSnapshot {
    pub aqi: i32,
    pub pollutants: Pollutants,
}

impl PollutionSnapshot {
    pub fn new(aqi: i32) -> Self {
        Self {
            aqi,
            pollutants: Pollutants::default(),
        }
    }
}

/// Point-in-time weather reading returned by a weather source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

/// An air-quality reading ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReading {
    pub location_id: LocationId,
    pub aqi: i32,
    pub pollutants: Pollutants,
    pub category: AqiCategory,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
}

/// A persisted air-quality reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub location_id: LocationId,
    pub aqi: i32,
    pub pollutants: Pollutants,
    pub category: AqiCategory,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
}

/// A temperature reading ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemperatureReading {
    pub location_id: LocationId,
    pub temperature: f64,
    pub humidity: f64,
    pub feels_like: f64,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
}

/// A persisted temperature reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub id: i64,
    pub location_id: LocationId,
    pub temperature: f64,
    pub humidity: f64,
    pub feels_like: f64,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
}

/// Location-agnostic alert produced by the alert rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

impl AlertCandidate {
    /// Attach the candidate to a location so it can be persisted.
    pub fn bind(self, location_id: LocationId) -> NewAlert {
        NewAlert {
            location_id,
            kind: self.kind,
            severity: self.severity,
            message: self.message,
        }
    }
}

/// An alert bound to a location, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub location_id: LocationId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

/// A persisted alert. `ended_at` stays `None` while the alert is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub location_id: LocationId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Outcome of processing one location during a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationOutcome {
    pub location_id: LocationId,
    pub location: String,
    pub aqi: Option<i32>,
    pub category: Option<AqiCategory>,
    pub temperature: Option<f64>,
    pub alerts: usize,
    pub error: Option<String>,
}

impl LocationOutcome {
    pub fn failed(location: &Location, error: impl Into<String>) -> Self {
        Self {
            location_id: location.id,
            location: location.name.clone(),
            aqi: None,
            category: None,
            temperature: None,
            alerts: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary returned by one ingestion cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub alerts: usize,
    /// `true` when shutdown was requested before every location was visited.
    pub cancelled: bool,
    pub details: Vec<LocationOutcome>,
}

impl CycleSummary {
    pub(crate) fn record(&mut self, outcome: LocationOutcome) {
        if outcome.is_success() {
            self.success += 1;
            self.alerts += outcome.alerts;
        } else {
            self.failed += 1;
        }
        self.details.push(outcome);
    }
}
