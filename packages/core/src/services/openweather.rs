use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::ingest::error::FetchError;
use crate::ingest::source::{FetchResult, WeatherSource};
use crate::ingest::types::{Coordinates, WeatherSnapshot};
use crate::services::waqi::DEFAULT_REQUEST_TIMEOUT;

pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org";

/// Client for the OpenWeatherMap current-weather endpoint.
#[derive(Clone)]
pub struct OpenWeatherClient {
    base_url: String,
    timeout: Duration,
    http: Client,
}

#[derive(Debug, Deserialize)]
pub struct OpenWeatherResponse {
    pub main: Option<OpenWeatherMain>,
}

#[derive(Debug, Deserialize)]
pub struct OpenWeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

impl OpenWeatherClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch_current(
        &self,
        coordinates: Coordinates,
        api_key: &str,
    ) -> FetchResult<OpenWeatherResponse> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("appid", api_key),
                ("units", "metric"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<OpenWeatherResponse>().await?)
    }
}

impl OpenWeatherResponse {
    pub fn into_snapshot(self) -> FetchResult<WeatherSnapshot> {
        let main = self
            .main
            .ok_or_else(|| FetchError::no_data("response has no main block"))?;

        Ok(WeatherSnapshot {
            temperature: main.temp,
            feels_like: main.feels_like,
            humidity: main.humidity,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_weather(
        &self,
        coordinates: Coordinates,
        api_key: &str,
    ) -> FetchResult<WeatherSnapshot> {
        self.fetch_current(coordinates, api_key).await?.into_snapshot()
    }

    fn provider_name(&self) -> &str {
        "OpenWeatherMap"
    }
}
