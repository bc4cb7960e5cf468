//! Ingestion scheduler.
//!
//! Drives the ingestion loop: each tick runs one orchestrator cycle, folds
//! the summary into the metrics and purges the derived read caches, so the
//! next read goes to the freshly written data.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::cache::{Cache, POST_CYCLE_PATTERNS};
use crate::ingest::{CycleSummary, IngestError, Orchestrator};
use crate::metrics::AppMetrics;

/// Run the ingestion loop until `shutdown` flips to `true`.
///
/// A failed cycle is logged and the loop continues; a cycle already in
/// progress stops at the next location boundary once shutdown is requested.
pub async fn run_ingestion(
    orchestrator: Arc<Orchestrator>,
    cache: Cache,
    metrics: Arc<AppMetrics>,
    poll_interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(Duration::from_secs(poll_interval_seconds.max(1)));

    tracing::info!(
        "Ingestion started (interval: {}s)",
        poll_interval_seconds
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = ingest_once(&orchestrator, &cache, &metrics, &shutdown).await {
                    tracing::error!("Ingestion cycle aborted: {}", err);
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Shutdown signal received. Stopping ingestion.");
                    break;
                }
            }
        }

        if *shutdown.borrow() {
            tracing::info!("Shutdown signal received. Stopping ingestion.");
            break;
        }
    }

    tracing::info!("Ingestion stopped cleanly");
}

/// Execute a single cycle, record it and invalidate read caches.
///
/// Caches are only purged when the cycle produced a summary; an aborted
/// cycle wrote nothing.
pub async fn ingest_once(
    orchestrator: &Orchestrator,
    cache: &Cache,
    metrics: &AppMetrics,
    shutdown: &watch::Receiver<bool>,
) -> Result<CycleSummary, IngestError> {
    let started = time::Instant::now();

    let summary = match orchestrator.run_cycle_until(shutdown).await {
        Ok(summary) => summary,
        Err(err) => {
            metrics.cycle_errors_total.inc();
            return Err(err);
        }
    };

    metrics.record_cycle(&summary, started.elapsed().as_secs_f64());

    let purged = cache.invalidate_all(POST_CYCLE_PATTERNS).await;
    tracing::debug!("Purged {} cached entries after ingestion", purged);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::CacheTtl;
    use crate::db::create_pool;
    use crate::ingest::{
        Coordinates, IngestConfig, NewLocation, PollutionSnapshot, ProviderCredentials,
    };
    use crate::repository::{AirQualityRepository, AirQualityStore};
    use crate::services::mock::{MockPollutionSource, MockWeatherSource};

    const ACCRA: Coordinates = Coordinates { latitude: 5.6, longitude: -0.19 };

    async fn make_orchestrator(credentials: ProviderCredentials) -> Arc<Orchestrator> {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repo = AirQualityRepository::new(pool);
        repo.insert_locations(&[NewLocation {
            name: "Accra".into(),
            region: None,
            latitude: ACCRA.latitude,
            longitude: ACCRA.longitude,
        }])
        .await
        .unwrap();

        let store: Arc<dyn AirQualityStore> = Arc::new(repo);
        Arc::new(Orchestrator::new(
            store,
            Arc::new(MockPollutionSource::new().with_reading(ACCRA, PollutionSnapshot::new(210))),
            Arc::new(MockWeatherSource::new()),
            credentials,
            IngestConfig {
                inter_location_delay: Duration::ZERO,
                ..IngestConfig::default()
            },
        ))
    }

    #[tokio::test]
    async fn ingest_once_records_metrics_and_purges_cache() {
        let orchestrator = make_orchestrator(ProviderCredentials::new("t", "k")).await;
        let cache = Cache::in_memory();
        let metrics = AppMetrics::new().unwrap();
        cache.set("dashboard:summary", &1_u32, CacheTtl::SUMMARY).await;
        cache.set("session:abc", &1_u32, CacheTtl::SUMMARY).await;
        let (_tx, rx) = watch::channel(false);

        let summary = ingest_once(&orchestrator, &cache, &metrics, &rx).await.unwrap();

        assert_eq!(summary.success, 1);
        assert_eq!(summary.alerts, 1);
        assert!((metrics.cycles_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.alerts_created_total.get() - 1.0).abs() < f64::EPSILON);
        assert_eq!(cache.get::<u32>("dashboard:summary").await, None);
        assert_eq!(cache.get::<u32>("session:abc").await, Some(1));
    }

    #[tokio::test]
    async fn aborted_cycle_keeps_cache_and_counts_error() {
        let orchestrator = make_orchestrator(ProviderCredentials::default()).await;
        let cache = Cache::in_memory();
        let metrics = AppMetrics::new().unwrap();
        cache.set("aqi:1:latest", &1_u32, CacheTtl::CURRENT).await;
        let (_tx, rx) = watch::channel(false);

        let result = ingest_once(&orchestrator, &cache, &metrics, &rx).await;

        assert!(matches!(result, Err(IngestError::Configuration { .. })));
        assert!((metrics.cycle_errors_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.cycles_total.get()).abs() < f64::EPSILON);
        assert_eq!(cache.get::<u32>("aqi:1:latest").await, Some(1));
    }

    #[tokio::test]
    async fn run_ingestion_stops_on_shutdown() {
        let orchestrator = make_orchestrator(ProviderCredentials::new("t", "k")).await;
        let metrics = Arc::new(AppMetrics::new().unwrap());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_ingestion(
            orchestrator,
            Cache::disabled(),
            metrics.clone(),
            3600,
            rx,
        ));

        // The first tick fires immediately; give it a moment to finish.
        time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!((metrics.cycles_total.get() - 1.0).abs() < f64::EPSILON);
    }
}
