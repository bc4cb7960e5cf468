//! In-process pollution and weather sources.
//!
//! Readings are keyed by coordinates; a location without a scripted reading
//! gets `FetchError::NoData`. Every call is counted so callers can assert on
//! how often a provider was hit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ingest::error::FetchError;
use crate::ingest::source::{FetchResult, PollutionSource, WeatherSource};
use crate::ingest::types::{Coordinates, PollutionSnapshot, WeatherSnapshot};

fn key(coordinates: Coordinates) -> String {
    format!("{:.5},{:.5}", coordinates.latitude, coordinates.longitude)
}

#[derive(Default)]
pub struct MockPollutionSource {
    readings: Mutex<HashMap<String, PollutionSnapshot>>,
    calls: AtomicUsize,
}

impl MockPollutionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(self, coordinates: Coordinates, snapshot: PollutionSnapshot) -> Self {
        self.set_reading(coordinates, snapshot);
        self
    }

    pub fn set_reading(&self, coordinates: Coordinates, snapshot: PollutionSnapshot) {
        if let Ok(mut readings) = self.readings.lock() {
            readings.insert(key(coordinates), snapshot);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollutionSource for MockPollutionSource {
    async fn fetch_pollution(
        &self,
        coordinates: Coordinates,
        _token: &str,
    ) -> FetchResult<PollutionSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings
            .lock()
            .ok()
            .and_then(|readings| readings.get(&key(coordinates)).cloned())
            .ok_or_else(|| FetchError::no_data(format!("no station near {}", coordinates)))
    }

    fn provider_name(&self) -> &str {
        "mock-pollution"
    }
}

#[derive(Default)]
pub struct MockWeatherSource {
    readings: Mutex<HashMap<String, WeatherSnapshot>>,
    calls: AtomicUsize,
}

impl MockWeatherSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(self, coordinates: Coordinates, snapshot: WeatherSnapshot) -> Self {
        if let Ok(mut readings) = self.readings.lock() {
            readings.insert(key(coordinates), snapshot);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for MockWeatherSource {
    async fn fetch_weather(
        &self,
        coordinates: Coordinates,
        _api_key: &str,
    ) -> FetchResult<WeatherSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings
            .lock()
            .ok()
            .and_then(|readings| readings.get(&key(coordinates)).copied())
            .ok_or_else(|| FetchError::no_data(format!("no weather for {}", coordinates)))
    }

    fn provider_name(&self) -> &str {
        "mock-weather"
    }
}
