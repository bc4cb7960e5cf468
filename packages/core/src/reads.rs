//! Cached read paths over the store.
//!
//! Read callers go through these helpers so the cache sits in front of the
//! database. A disabled or failing cache only costs a database round-trip.

use crate::cache::{Cache, CacheTtl};
use crate::ingest::types::{Alert, LocationId, Reading};
use crate::repository::AirQualityStore;

pub fn active_alerts_key(location_id: Option<LocationId>) -> String {
    match location_id {
        Some(id) => format!("alerts:{}", id),
        None => "alerts:all".to_string(),
    }
}

pub fn latest_reading_key(location_id: LocationId) -> String {
    format!("aqi:{}:latest", location_id)
}

/// Active alerts, optionally for one location, newest first.
pub async fn active_alerts(
    store: &dyn AirQualityStore,
    cache: &Cache,
    location_id: Option<LocationId>,
) -> Result<Vec<Alert>, sqlx::Error> {
    let key = active_alerts_key(location_id);
    if let Some(alerts) = cache.get::<Vec<Alert>>(&key).await {
        return Ok(alerts);
    }

    let alerts = store.active_alerts(location_id).await?;
    cache.set(&key, &alerts, CacheTtl::CURRENT).await;
    Ok(alerts)
}

/// Most recent reading for a location. Absent readings are not cached.
pub async fn latest_reading(
    store: &dyn AirQualityStore,
    cache: &Cache,
    location_id: LocationId,
) -> Result<Option<Reading>, sqlx::Error> {
    let key = latest_reading_key(location_id);
    if let Some(reading) = cache.get::<Reading>(&key).await {
        return Ok(Some(reading));
    }

    let reading = store.latest_reading(location_id).await?;
    if let Some(reading) = &reading {
        cache.set(&key, reading, CacheTtl::CURRENT).await;
    }
    Ok(reading)
}
