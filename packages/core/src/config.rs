use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;
use crate::ingest::config::DEFAULT_INTER_LOCATION_DELAY;
use crate::ingest::{IngestConfig, ProviderCredentials};
use crate::services::{
    openweather::DEFAULT_OPENWEATHER_URL,
    waqi::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_WAQI_URL},
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://air_quality.db";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 3600;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Disabled,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Optional at startup; each ingestion cycle checks for it.
    pub waqi_token: Option<String>,
    pub owm_api_key: Option<String>,
    pub waqi_base_url: String,
    pub owm_base_url: String,
    /// Always non-zero.
    pub poll_interval_seconds: u64,
    pub inter_location_delay: Duration,
    /// Per-request timeout for both provider clients.
    pub provider_timeout: Duration,
    pub cache_backend: CacheBackendKind,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_backend = match get("CACHE_BACKEND").as_deref() {
            None | Some("none") => CacheBackendKind::Disabled,
            Some("memory") => CacheBackendKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CACHE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let inter_location_delay = match get("INGEST_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number("INGEST_DELAY_MS", &raw)?),
            None => DEFAULT_INTER_LOCATION_DELAY,
        };

        let provider_timeout = match get("PROVIDER_TIMEOUT_SECONDS") {
            Some(raw) => Duration::from_secs(parse_positive("PROVIDER_TIMEOUT_SECONDS", &raw)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            waqi_token: get("WAQI_API_TOKEN"),
            owm_api_key: get("OWM_API_KEY"),
            waqi_base_url: get("WAQI_BASE_URL").unwrap_or_else(|| DEFAULT_WAQI_URL.to_string()),
            owm_base_url: get("OWM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENWEATHER_URL.to_string()),
            poll_interval_seconds: match get("POLL_INTERVAL_SECONDS") {
                Some(raw) => parse_positive("POLL_INTERVAL_SECONDS", &raw)?,
                None => DEFAULT_POLL_INTERVAL_SECONDS,
            },
            inter_location_delay,
            provider_timeout,
            cache_backend,
            metrics_port: match get("METRICS_PORT") {
                Some(raw) => parse_number("METRICS_PORT", &raw)?,
                None => DEFAULT_METRICS_PORT,
            },
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(seconds) = cli.poll_interval {
            if seconds == 0 {
                return Err(ConfigError::Invalid {
                    key: "--poll-interval",
                    value: seconds.to_string(),
                });
            }
            self.poll_interval_seconds = seconds;
        }
        Ok(self)
    }

    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            pollution_token: self.waqi_token.clone(),
            weather_api_key: self.owm_api_key.clone(),
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            inter_location_delay: self.inter_location_delay,
            ..IngestConfig::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match parse_number::<u64>(key, raw)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
        value => Ok(value),
    }
}
