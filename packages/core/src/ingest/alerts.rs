//! Alert rules evaluated against a single location's readings.
//!
//! Two independent signals are checked: the air-quality index and the
//! temperature. Each contributes at most one candidate, and only its highest
//! matching tier.

use crate::ingest::config::AlertThresholds;
use crate::ingest::types::{AlertCandidate, AlertKind, AlertSeverity};

/// Evaluate the default alert rules.
pub fn generate_alerts(index: i32, temperature: Option<f64>) -> Vec<AlertCandidate> {
    AlertThresholds::default().evaluate(index, temperature)
}

impl AlertThresholds {
    /// Returns the index candidate (if any) followed by the temperature
    /// candidate (if any).
    pub fn evaluate(&self, index: i32, temperature: Option<f64>) -> Vec<AlertCandidate> {
        let mut alerts = Vec::with_capacity(2);

        if let Some(candidate) = self.index_alert(index) {
            alerts.push(candidate);
        }
        if let Some(candidate) = temperature.and_then(|t| self.temperature_alert(t)) {
            alerts.push(candidate);
        }

        alerts
    }

    fn index_alert(&self, index: i32) -> Option<AlertCandidate> {
        if index > self.index_critical {
            Some(AlertCandidate {
                kind: AlertKind::IndexSpike,
                severity: AlertSeverity::Critical,
                message: format!(
                    "Hazardous AQI of {} detected. Stay indoors and avoid all outdoor activity.",
                    index
                ),
            })
        } else if index > self.index_high {
            Some(AlertCandidate {
                kind: AlertKind::IndexSpike,
                severity: AlertSeverity::High,
                message: format!(
                    "Very unhealthy AQI of {}. Sensitive groups should stay indoors.",
                    index
                ),
            })
        } else if index > self.index_advisory {
            Some(AlertCandidate {
                kind: AlertKind::HealthAdvisory,
                severity: AlertSeverity::Medium,
                message: format!(
                    "Unhealthy AQI of {}. Reduce prolonged outdoor exertion.",
                    index
                ),
            })
        } else {
            None
        }
    }

    fn temperature_alert(&self, temperature: f64) -> Option<AlertCandidate> {
        if temperature > self.heat_critical {
            Some(AlertCandidate {
                kind: AlertKind::TemperatureExtreme,
                severity: AlertSeverity::Critical,
                message: format!(
                    "Extreme heat: {:.1}°C. Heat stroke risk is very high.",
                    temperature
                ),
            })
        } else if temperature < self.cold_high {
            Some(AlertCandidate {
                kind: AlertKind::TemperatureExtreme,
                severity: AlertSeverity::High,
                message: format!(
                    "Extreme cold: {:.1}°C. Risk of frostbite and hypothermia.",
                    temperature
                ),
            })
        } else {
            None
        }
    }
}
