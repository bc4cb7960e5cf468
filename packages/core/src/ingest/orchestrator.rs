//! Ingestion orchestrator - drives one full cycle over every location

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::ingest::{
    config::IngestConfig,
    error::{IngestError, LocationError},
    source::{PollutionSource, WeatherSource},
    types::*,
};
use crate::repository::AirQualityStore;

/// Provider credentials. Both are required before a cycle may start.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub pollution_token: Option<String>,
    pub weather_api_key: Option<String>,
}

impl ProviderCredentials {
    pub fn new(pollution_token: impl Into<String>, weather_api_key: impl Into<String>) -> Self {
        Self {
            pollution_token: Some(pollution_token.into()),
            weather_api_key: Some(weather_api_key.into()),
        }
    }

    fn require(&self) -> Result<(&str, &str), IngestError> {
        fn present(value: &Option<String>) -> Option<&str> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
        }

        let token = present(&self.pollution_token)
            .ok_or_else(|| IngestError::configuration("missing WAQI_API_TOKEN"))?;
        let key = present(&self.weather_api_key)
            .ok_or_else(|| IngestError::configuration("missing OWM_API_KEY"))?;

        Ok((token, key))
    }
}

/// Runs ingestion cycles: reset alerts, then visit each location in turn.
pub struct Orchestrator {
    store: Arc<dyn AirQualityStore>,
    pollution: Arc<dyn PollutionSource>,
    weather: Arc<dyn WeatherSource>,
    credentials: ProviderCredentials,
    config: IngestConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn AirQualityStore>,
        pollution: Arc<dyn PollutionSource>,
        weather: Arc<dyn WeatherSource>,
        credentials: ProviderCredentials,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            pollution,
            weather,
            credentials,
            config,
        }
    }

    /// Run one complete cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary, IngestError> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_cycle_until(&shutdown_rx).await
    }

    /// Run one cycle, stopping early once `shutdown` reads `true`.
    ///
    /// `shutdown` is consulted before the alert reset and between locations,
    /// so a location is either fully persisted or not visited at all. A
    /// cycle cancelled before the reset leaves the store untouched.
    ///
    /// Fails only when credentials are missing, or when the store cannot list
    /// locations or reset alerts. Every per-location failure is recorded in
    /// the summary instead.
    pub async fn run_cycle_until(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleSummary, IngestError> {
        let (token, api_key) = self.credentials.require()?;

        let locations = self.store.list_locations().await?;
        let mut summary = CycleSummary {
            total: locations.len(),
            ..CycleSummary::default()
        };

        if shutdown_requested(shutdown) {
            tracing::info!("Shutdown requested before the cycle started, alerts left as they were");
            summary.cancelled = true;
            return Ok(summary);
        }

        let closed = self.store.deactivate_active_alerts(Utc::now()).await?;
        tracing::debug!("Closed {} alerts from the previous cycle", closed);

        for (i, location) in locations.iter().enumerate() {
            if i > 0 && !self.config.inter_location_delay.is_zero() {
                tokio::time::sleep(self.config.inter_location_delay).await;
            }

            if shutdown_requested(shutdown) {
                tracing::info!(
                    "Shutdown requested, skipping {} remaining locations",
                    locations.len() - i
                );
                summary.cancelled = true;
                break;
            }

            let outcome = match self.process_location(location, token, api_key).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!("Ingestion failed for {}: {}", location.name, err);
                    LocationOutcome::failed(location, err.to_string())
                }
            };
            summary.record(outcome);
        }

        tracing::info!(
            "Ingestion cycle done: {}/{} locations updated, {} failed, {} alerts",
            summary.success,
            summary.total,
            summary.failed,
            summary.alerts,
        );

        Ok(summary)
    }

    async fn process_location(
        &self,
        location: &Location,
        token: &str,
        api_key: &str,
    ) -> Result<LocationOutcome, LocationError> {
        let recorded_at = Utc::now();

        let pollution = self
            .pollution
            .fetch_pollution(location.coordinates, token)
            .await;
        let weather = self
            .weather
            .fetch_weather(location.coordinates, api_key)
            .await;

        let pollution = pollution.map_err(|err| {
            tracing::debug!(
                "{} returned no data for {}: {}",
                self.pollution.provider_name(),
                location.name,
                err
            );
            LocationError::NoPollutionData
        })?;

        let weather = match weather {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::debug!(
                    "{} returned no data for {}: {}",
                    self.weather.provider_name(),
                    location.name,
                    err
                );
                None
            }
        };

        let category = self.config.breakpoints.classify(pollution.aqi);
        tracing::debug!(
            "{}: AQI {} ({}). {}",
            location.name,
            pollution.aqi,
            category.label(),
            category.health_advice()
        );

        self.store
            .insert_reading(&NewReading {
                location_id: location.id,
                aqi: pollution.aqi,
                pollutants: pollution.pollutants,
                category,
                recorded_at,
                source: POLLUTION_SOURCE_TAG.to_string(),
            })
            .await?;

        if let Some(snapshot) = &weather {
            self.store
                .insert_temperature_reading(&NewTemperatureReading {
                    location_id: location.id,
                    temperature: snapshot.temperature,
                    humidity: snapshot.humidity,
                    feels_like: snapshot.feels_like,
                    recorded_at,
                    source: WEATHER_SOURCE_TAG.to_string(),
                })
                .await?;
        }

        let temperature = weather.map(|w| w.temperature);
        let alerts: Vec<NewAlert> = self
            .config
            .alert_thresholds
            .evaluate(pollution.aqi, temperature)
            .into_iter()
            .map(|candidate| candidate.bind(location.id))
            .collect();

        self.store.insert_alerts(&alerts, recorded_at).await?;

        Ok(LocationOutcome {
            location_id: location.id,
            location: location.name.clone(),
            aqi: Some(pollution.aqi),
            category: Some(category),
            temperature,
            alerts: alerts.len(),
            error: None,
        })
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::db::create_pool;
    use crate::repository::AirQualityRepository;
    use crate::services::mock::{MockPollutionSource, MockWeatherSource};

    const DELHI: Coordinates = Coordinates { latitude: 28.61, longitude: 77.21 };
    const OSLO: Coordinates = Coordinates { latitude: 59.91, longitude: 10.75 };
    const LIMA: Coordinates = Coordinates { latitude: -12.05, longitude: -77.04 };

    fn fast_config() -> IngestConfig {
        IngestConfig {
            inter_location_delay: Duration::ZERO,
            ..IngestConfig::default()
        }
    }

    fn credentials() -> ProviderCredentials {
        ProviderCredentials::new("waqi-token", "owm-key")
    }

    async fn seeded_repo() -> Arc<AirQualityRepository> {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repo = AirQualityRepository::new(pool);
        let seed = [("Delhi", DELHI), ("Oslo", OSLO), ("Lima", LIMA)];
        let locations: Vec<NewLocation> = seed
            .iter()
            .map(|(name, c)| NewLocation {
                name: name.to_string(),
                region: None,
                latitude: c.latitude,
                longitude: c.longitude,
            })
            .collect();
        repo.insert_locations(&locations).await.unwrap();
        Arc::new(repo)
    }

    fn pollution_all_ok() -> MockPollutionSource {
        MockPollutionSource::new()
            .with_reading(DELHI, PollutionSnapshot::new(350))
            .with_reading(OSLO, PollutionSnapshot::new(30))
            .with_reading(LIMA, PollutionSnapshot::new(120))
    }

    fn weather_all_ok() -> MockWeatherSource {
        let snapshot = |t: f64| WeatherSnapshot {
            temperature: t,
            feels_like: t - 2.0,
            humidity: 50.0,
        };
        MockWeatherSource::new()
            .with_reading(DELHI, snapshot(31.0))
            .with_reading(OSLO, snapshot(-20.0))
            .with_reading(LIMA, snapshot(18.0))
    }

    fn orchestrator(
        store: Arc<dyn AirQualityStore>,
        pollution: Arc<MockPollutionSource>,
        weather: Arc<MockWeatherSource>,
    ) -> Orchestrator {
        Orchestrator::new(store, pollution, weather, credentials(), fast_config())
    }

    async fn active_conditions(repo: &AirQualityRepository) -> BTreeSet<(i64, String, String)> {
        repo.active_alerts(None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.location_id, a.kind.as_str().to_string(), a.severity.as_str().to_string()))
            .collect()
    }

    // ---- configuration ----

    #[tokio::test]
    async fn missing_credentials_abort_before_any_work() {
        let repo = seeded_repo().await;
        let pollution = Arc::new(pollution_all_ok());
        let weather = Arc::new(weather_all_ok());
        let orchestrator = Orchestrator::new(
            repo.clone(),
            pollution.clone(),
            weather.clone(),
            ProviderCredentials {
                pollution_token: Some("token".into()),
                weather_api_key: None,
            },
            fast_config(),
        );

        let result = orchestrator.run_cycle().await;

        assert!(matches!(result, Err(IngestError::Configuration { .. })));
        assert_eq!(pollution.calls(), 0);
        assert_eq!(weather.calls(), 0);
        let locations = repo.list_locations().await.unwrap();
        assert!(repo.readings_for(locations[0].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_credentials_count_as_missing() {
        let repo = seeded_repo().await;
        let orchestrator = Orchestrator::new(
            repo,
            Arc::new(pollution_all_ok()),
            Arc::new(weather_all_ok()),
            ProviderCredentials::new("   ", "key"),
            fast_config(),
        );

        assert!(matches!(
            orchestrator.run_cycle().await,
            Err(IngestError::Configuration { .. })
        ));
    }

    // ---- happy path ----

    #[tokio::test]
    async fn full_cycle_persists_readings_and_alerts() {
        let repo = seeded_repo().await;
        let orchestrator = orchestrator(
            repo.clone(),
            Arc::new(pollution_all_ok()),
            Arc::new(weather_all_ok()),
        );

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 3);
        assert_eq!(summary.failed, 0);
        // Delhi: critical spike. Oslo: extreme cold. Lima: nothing.
        assert_eq!(summary.alerts, 2);
        assert!(!summary.cancelled);

        let delhi = &summary.details[0];
        assert_eq!(delhi.aqi, Some(350));
        assert_eq!(delhi.category, Some(AqiCategory::Hazardous));
        assert_eq!(delhi.temperature, Some(31.0));

        for location in repo.list_locations().await.unwrap() {
            assert_eq!(repo.readings_for(location.id).await.unwrap().len(), 1);
            assert_eq!(repo.temperature_readings_for(location.id).await.unwrap().len(), 1);
        }

        let active = repo.active_alerts(None).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active
            .iter()
            .any(|a| a.kind == AlertKind::TemperatureExtreme && a.severity == AlertSeverity::High));
    }

    #[tokio::test]
    async fn missing_weather_still_succeeds_without_temperature() {
        let repo = seeded_repo().await;
        let orchestrator = orchestrator(
            repo.clone(),
            Arc::new(pollution_all_ok()),
            Arc::new(MockWeatherSource::new()),
        );

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.success, 3);
        assert!(summary.details.iter().all(|d| d.temperature.is_none()));
        // Only Delhi's index alert; no temperature candidates without weather.
        assert_eq!(summary.alerts, 1);
        let locations = repo.list_locations().await.unwrap();
        assert!(repo.temperature_readings_for(locations[1].id).await.unwrap().is_empty());
    }

    // ---- fault isolation ----

    #[tokio::test]
    async fn one_missing_pollution_feed_fails_only_that_location() {
        let repo = seeded_repo().await;
        let pollution = MockPollutionSource::new()
            .with_reading(DELHI, PollutionSnapshot::new(80))
            .with_reading(LIMA, PollutionSnapshot::new(160));
        let weather = Arc::new(weather_all_ok());
        let orchestrator = orchestrator(repo.clone(), Arc::new(pollution), weather.clone());

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
        let oslo = &summary.details[1];
        assert_eq!(oslo.error.as_deref(), Some("no pollution data"));
        assert_eq!(oslo.temperature, None);
        // Weather is still fetched for the failing location.
        assert_eq!(weather.calls(), 3);

        let locations = repo.list_locations().await.unwrap();
        assert!(repo.readings_for(locations[1].id).await.unwrap().is_empty());
        assert!(repo.temperature_readings_for(locations[1].id).await.unwrap().is_empty());
        for location in [&locations[0], &locations[2]] {
            let readings = repo.readings_for(location.id).await.unwrap();
            assert_eq!(readings.len(), 1);
            assert_eq!(readings[0].category, crate::ingest::classify(readings[0].aqi));
        }
    }

    /// Store that rejects readings for one location.
    struct FailingStore {
        inner: Arc<AirQualityRepository>,
        reject_location: LocationId,
    }

    #[async_trait]
    impl AirQualityStore for FailingStore {
        async fn list_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
            self.inner.list_locations().await
        }

        async fn insert_reading(&self, reading: &NewReading) -> Result<i64, sqlx::Error> {
            if reading.location_id == self.reject_location {
                return Err(sqlx::Error::Protocol("disk I/O error".into()));
            }
            self.inner.insert_reading(reading).await
        }

        async fn insert_temperature_reading(
            &self,
            reading: &NewTemperatureReading,
        ) -> Result<i64, sqlx::Error> {
            self.inner.insert_temperature_reading(reading).await
        }

        async fn insert_alerts(
            &self,
            alerts: &[NewAlert],
            started_at: DateTime<Utc>,
        ) -> Result<u64, sqlx::Error> {
            self.inner.insert_alerts(alerts, started_at).await
        }

        async fn deactivate_active_alerts(
            &self,
            ended_at: DateTime<Utc>,
        ) -> Result<u64, sqlx::Error> {
            self.inner.deactivate_active_alerts(ended_at).await
        }

        async fn active_alerts(
            &self,
            location_id: Option<LocationId>,
        ) -> Result<Vec<Alert>, sqlx::Error> {
            self.inner.active_alerts(location_id).await
        }

        async fn latest_reading(
            &self,
            location_id: LocationId,
        ) -> Result<Option<Reading>, sqlx::Error> {
            self.inner.latest_reading(location_id).await
        }
    }

    #[tokio::test]
    async fn persistence_error_is_contained_to_its_location() {
        let repo = seeded_repo().await;
        let delhi_id = repo.list_locations().await.unwrap()[0].id;
        let store = Arc::new(FailingStore {
            inner: repo.clone(),
            reject_location: delhi_id,
        });
        let orchestrator = orchestrator(
            store,
            Arc::new(pollution_all_ok()),
            Arc::new(weather_all_ok()),
        );

        let summary = orchestrator.run_cycle().await.unwrap();

        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
        let error = summary.details[0].error.as_deref().unwrap();
        assert!(error.contains("disk I/O error"), "unexpected error: {}", error);
        // Delhi's critical alert was never written; only Oslo's cold alert.
        assert_eq!(summary.alerts, 1);
        assert_eq!(repo.active_alerts(None).await.unwrap().len(), 1);
    }

    // ---- alert reset ----

    #[tokio::test]
    async fn consecutive_cycles_converge_on_the_same_active_conditions() {
        let repo = seeded_repo().await;
        let orchestrator = orchestrator(
            repo.clone(),
            Arc::new(pollution_all_ok()),
            Arc::new(weather_all_ok()),
        );

        orchestrator.run_cycle().await.unwrap();
        let first = active_conditions(&repo).await;
        let first_ids: Vec<i64> = repo.active_alerts(None).await.unwrap().iter().map(|a| a.id).collect();

        orchestrator.run_cycle().await.unwrap();
        let second = active_conditions(&repo).await;
        let second_ids: Vec<i64> = repo.active_alerts(None).await.unwrap().iter().map(|a| a.id).collect();

        assert_eq!(first, second);
        assert!(first_ids.iter().all(|id| !second_ids.contains(id)));

        let history = repo.alert_history().await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().filter(|a| !a.active).count(), 2);
        assert!(history.iter().filter(|a| !a.active).all(|a| a.ended_at.is_some()));
    }

    #[tokio::test]
    async fn cleared_condition_closes_its_alert() {
        let repo = seeded_repo().await;
        let pollution = Arc::new(pollution_all_ok());
        let orchestrator = orchestrator(repo.clone(), pollution.clone(), Arc::new(weather_all_ok()));

        orchestrator.run_cycle().await.unwrap();
        pollution.set_reading(DELHI, PollutionSnapshot::new(40));
        orchestrator.run_cycle().await.unwrap();

        let kinds: HashMap<AlertKind, AlertSeverity> = repo
            .active_alerts(None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.kind, a.severity))
            .collect();
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds.get(&AlertKind::TemperatureExtreme), Some(&AlertSeverity::High));
    }

    // ---- throttling / cancellation ----

    #[tokio::test]
    async fn cycle_waits_between_locations() {
        let repo = seeded_repo().await;
        let delay = Duration::from_millis(40);
        let orchestrator = Orchestrator::new(
            repo,
            Arc::new(pollution_all_ok()),
            Arc::new(weather_all_ok()),
            credentials(),
            IngestConfig {
                inter_location_delay: delay,
                ..IngestConfig::default()
            },
        );

        let started = std::time::Instant::now();
        orchestrator.run_cycle().await.unwrap();

        // Two gaps between three locations.
        assert!(started.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn shutdown_before_cycle_keeps_active_alerts() {
        let repo = seeded_repo().await;
        let pollution = Arc::new(pollution_all_ok());
        let orchestrator = orchestrator(repo.clone(), pollution.clone(), Arc::new(weather_all_ok()));

        orchestrator.run_cycle().await.unwrap();
        let before = active_conditions(&repo).await;
        assert!(!before.is_empty());

        let (tx, rx) = watch::channel(true);
        let summary = orchestrator.run_cycle_until(&rx).await.unwrap();
        drop(tx);

        assert!(summary.cancelled);
        assert_eq!(summary.total, 3);
        assert!(summary.details.is_empty());
        assert_eq!(pollution.calls(), 3);
        assert_eq!(active_conditions(&repo).await, before);
    }

    #[tokio::test]
    async fn shutdown_during_delay_skips_the_next_location() {
        let repo = seeded_repo().await;
        let pollution = Arc::new(pollution_all_ok());
        let orchestrator = Orchestrator::new(
            repo,
            pollution.clone(),
            Arc::new(weather_all_ok()),
            credentials(),
            IngestConfig {
                inter_location_delay: Duration::from_millis(300),
                ..IngestConfig::default()
            },
        );

        let (tx, rx) = watch::channel(false);
        let stop = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
            tx
        });

        let summary = orchestrator.run_cycle_until(&rx).await.unwrap();
        let _tx = stop.await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.details.len(), 1);
        assert_eq!(summary.details[0].location, "Delhi");
        assert_eq!(pollution.calls(), 1);
    }
}
