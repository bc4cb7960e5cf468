//! Pollution and weather source interfaces
//!
//! Abstraction layer over the external providers so the ingestion cycle can
//! run against real HTTP clients or in-process fakes.

use async_trait::async_trait;

use crate::ingest::{
    error::FetchError,
    types::{Coordinates, PollutionSnapshot, WeatherSnapshot},
};

/// Result type for source operations
pub type FetchResult<T> = Result<T, FetchError>;

/// A provider of air-quality index readings.
#[async_trait]
pub trait PollutionSource: Send + Sync {
    /// Fetch the current reading nearest to `coordinates`.
    ///
    /// Never panics; every failure, including a payload that fails the shape
    /// check, comes back as a [`FetchError`].
    async fn fetch_pollution(
        &self,
        coordinates: Coordinates,
        token: &str,
    ) -> FetchResult<PollutionSnapshot>;

    /// Name used in logs.
    fn provider_name(&self) -> &str;
}

/// A provider of current weather conditions.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current temperature, feels-like and humidity at `coordinates`.
    async fn fetch_weather(
        &self,
        coordinates: Coordinates,
        api_key: &str,
    ) -> FetchResult<WeatherSnapshot>;

    fn provider_name(&self) -> &str;
}
