//! AQI band classification.

use crate::ingest::config::Breakpoints;
use crate::ingest::types::AqiCategory;

/// Classify an index using the standard breakpoints.
pub fn classify(index: i32) -> AqiCategory {
    Breakpoints::default().classify(index)
}

impl Breakpoints {
    /// First band whose inclusive upper bound holds `index`, ascending.
    /// Negative values land in `Good`, values past the scale in `Hazardous`.
    pub fn classify(&self, index: i32) -> AqiCategory {
        if index <= self.good {
            AqiCategory::Good
        } else if index <= self.moderate {
            AqiCategory::Moderate
        } else if index <= self.unhealthy_sensitive {
            AqiCategory::UnhealthySensitive
        } else if index <= self.unhealthy {
            AqiCategory::Unhealthy
        } else if index <= self.very_unhealthy {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }
}
