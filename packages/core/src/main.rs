use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::watch;

use air_quality_tracker::{
    api,
    cache::Cache,
    cli::Cli,
    config::{CacheBackendKind, Config},
    db,
    error::AppError,
    ingest::{NewLocation, Orchestrator},
    logging::init_logging,
    metrics::AppMetrics,
    repository::{AirQualityRepository, AirQualityStore},
    scheduler,
    services::{openweather::OpenWeatherClient, waqi::WaqiClient},
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()?.with_cli(&cli)?;
    tracing::info!(
        "Starting with database {} (interval: {}s, cache: {:?})",
        config.database_url,
        config.poll_interval_seconds,
        config.cache_backend
    );
    if config.waqi_token.is_none() || config.owm_api_key.is_none() {
        tracing::warn!("Provider credentials are incomplete; ingestion cycles will be refused");
    }

    let pool = db::create_pool(&config.database_url).await?;
    let repository = AirQualityRepository::new(pool.clone());

    if let Some(path) = &cli.locations {
        let added = seed_locations(&repository, path).await?;
        tracing::info!("Seeded {} new locations from {}", added, path.display());
    }

    let metrics = Arc::new(AppMetrics::new()?);
    let cache = match config.cache_backend {
        CacheBackendKind::Memory => Cache::in_memory().with_metrics(metrics.clone()),
        CacheBackendKind::Disabled => Cache::disabled(),
    };

    let store: Arc<dyn AirQualityStore> = Arc::new(repository);
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        Arc::new(WaqiClient::new(config.waqi_base_url.clone()).with_timeout(config.provider_timeout)),
        Arc::new(
            OpenWeatherClient::new(config.owm_base_url.clone()).with_timeout(config.provider_timeout),
        ),
        config.credentials(),
        config.ingest_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let result = if cli.once {
        run_once(&orchestrator, &cache, &metrics, &shutdown_rx).await
    } else {
        serve_ops(&config, metrics.clone(), pool, shutdown_rx.clone()).await?;
        scheduler::run_ingestion(
            orchestrator,
            cache.clone(),
            metrics,
            config.poll_interval_seconds,
            shutdown_rx,
        )
        .await;
        Ok(())
    };

    cache.close().await;
    result
}

async fn run_once(
    orchestrator: &Orchestrator,
    cache: &Cache,
    metrics: &AppMetrics,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), AppError> {
    let summary = scheduler::ingest_once(orchestrator, cache, metrics, shutdown).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Bind the ops listener and serve it in the background until shutdown.
async fn serve_ops(
    config: &Config,
    metrics: Arc<AppMetrics>,
    pool: sqlx::SqlitePool,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving /health and /metrics on {}", addr);

    let app = api::ops_router(metrics, pool);
    tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            })
            .await;
        if let Err(err) = served {
            tracing::error!("Ops server error: {}", err);
        }
    });

    Ok(())
}

async fn seed_locations(repository: &AirQualityRepository, path: &Path) -> Result<u64, AppError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let locations: Vec<NewLocation> = serde_json::from_str(&raw)?;
    Ok(repository.insert_locations(&locations).await?)
}
