//! Database repository for air-quality persistence.
//!
//! All SQLite read/write logic lives here. The ingestion cycle talks to it
//! through the [`AirQualityStore`] trait: it lists locations, appends
//! readings, bulk-deactivates the previous cycle's alerts and inserts the new
//! ones. Read callers use the same trait for active alerts and the latest
//! reading per location.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::ingest::types::{
    Alert, Coordinates, Location, LocationId, NewAlert, NewLocation, NewReading,
    NewTemperatureReading, Pollutants, Reading, TemperatureReading,
};

/// The store operations the ingestion cycle and read callers depend on.
#[async_trait]
pub trait AirQualityStore: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<Location>, sqlx::Error>;

    /// Append a reading. Returns the new row id.
    async fn insert_reading(&self, reading: &NewReading) -> Result<i64, sqlx::Error>;

    /// Append a temperature reading. Returns the new row id.
    async fn insert_temperature_reading(
        &self,
        reading: &NewTemperatureReading,
    ) -> Result<i64, sqlx::Error>;

    /// Insert active alerts started at `started_at`, all or none.
    async fn insert_alerts(
        &self,
        alerts: &[NewAlert],
        started_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;

    /// Close every active alert in one statement. Returns how many were closed.
    async fn deactivate_active_alerts(&self, ended_at: DateTime<Utc>) -> Result<u64, sqlx::Error>;

    /// Active alerts, newest first, optionally for one location.
    async fn active_alerts(&self, location_id: Option<LocationId>)
        -> Result<Vec<Alert>, sqlx::Error>;

    async fn latest_reading(&self, location_id: LocationId)
        -> Result<Option<Reading>, sqlx::Error>;
}

/// Repository for reading and writing air-quality data to SQLite.
pub struct AirQualityRepository {
    pool: SqlitePool,
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn location_from_row(row: &SqliteRow) -> Option<Location> {
    Some(Location {
        id: row.try_get("id").ok()?,
        name: row.try_get("name").ok()?,
        region: row.try_get("region").ok()?,
        coordinates: Coordinates {
            latitude: row.try_get("latitude").ok()?,
            longitude: row.try_get("longitude").ok()?,
        },
    })
}

fn reading_from_row(row: &SqliteRow) -> Option<Reading> {
    let category: String = row.try_get("category").ok()?;
    let recorded_at: String = row.try_get("recorded_at").ok()?;

    Some(Reading {
        id: row.try_get("id").ok()?,
        location_id: row.try_get("location_id").ok()?,
        aqi: row.try_get("aqi").ok()?,
        pollutants: Pollutants {
            pm25: row.try_get("pm25").ok()?,
            pm10: row.try_get("pm10").ok()?,
            o3: row.try_get("o3").ok()?,
            no2: row.try_get("no2").ok()?,
            so2: row.try_get("so2").ok()?,
            co: row.try_get("co").ok()?,
        },
        category: category.parse().ok()?,
        recorded_at: parse_timestamp(&recorded_at)?,
        source: row.try_get("source").ok()?,
    })
}

fn alert_from_row(row: &SqliteRow) -> Option<Alert> {
    let kind: String = row.try_get("kind").ok()?;
    let severity: String = row.try_get("severity").ok()?;
    let active: i64 = row.try_get("active").ok()?;
    let started_at: String = row.try_get("started_at").ok()?;
    let ended_at: Option<String> = row.try_get("ended_at").ok()?;

    let ended_at = match ended_at {
        Some(value) => Some(parse_timestamp(&value)?),
        None => None,
    };

    Some(Alert {
        id: row.try_get("id").ok()?,
        location_id: row.try_get("location_id").ok()?,
        kind: kind.parse().ok()?,
        severity: severity.parse().ok()?,
        message: row.try_get("message").ok()?,
        active: active != 0,
        started_at: parse_timestamp(&started_at)?,
        ended_at,
    })
}

impl AirQualityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert locations whose name is not already known.
    /// Returns how many were added.
    pub async fn insert_locations(&self, locations: &[NewLocation]) -> Result<u64, sqlx::Error> {
        if locations.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for location in locations {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO locations (name, region, latitude, longitude)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&location.name)
            .bind(&location.region)
            .bind(location.latitude)
            .bind(location.longitude)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// All readings for a location, oldest first.
    pub async fn readings_for(&self, location_id: LocationId) -> Result<Vec<Reading>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, location_id, aqi, pm25, pm10, o3, no2, so2, co, category, recorded_at, source
             FROM aqi_readings
             WHERE location_id = ?
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(reading_from_row).collect())
    }

    /// All temperature readings for a location, oldest first.
    pub async fn temperature_readings_for(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<TemperatureReading>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, location_id, temperature, humidity, feels_like, recorded_at, source
             FROM temperature_readings
             WHERE location_id = ?
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        let readings = rows
            .iter()
            .filter_map(|row| {
                let recorded_at: String = row.try_get("recorded_at").ok()?;
                Some(TemperatureReading {
                    id: row.try_get("id").ok()?,
                    location_id: row.try_get("location_id").ok()?,
                    temperature: row.try_get("temperature").ok()?,
                    humidity: row.try_get("humidity").ok()?,
                    feels_like: row.try_get("feels_like").ok()?,
                    recorded_at: parse_timestamp(&recorded_at)?,
                    source: row.try_get("source").ok()?,
                })
            })
            .collect();

        Ok(readings)
    }

    /// Every alert ever raised, oldest first, including closed ones.
    pub async fn alert_history(&self) -> Result<Vec<Alert>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, location_id, kind, severity, message, active, started_at, ended_at
             FROM alerts
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(alert_from_row).collect())
    }
}

#[async_trait]
impl AirQualityStore for AirQualityRepository {
    async fn list_locations(&self) -> Result<Vec<Location>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, region, latitude, longitude FROM locations ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(location_from_row).collect())
    }

    async fn insert_reading(&self, reading: &NewReading) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO aqi_readings
             (location_id, aqi, pm25, pm10, o3, no2, so2, co, category, recorded_at, source)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.location_id)
        .bind(reading.aqi)
        .bind(reading.pollutants.pm25)
        .bind(reading.pollutants.pm10)
        .bind(reading.pollutants.o3)
        .bind(reading.pollutants.no2)
        .bind(reading.pollutants.so2)
        .bind(reading.pollutants.co)
        .bind(reading.category.as_str())
        .bind(reading.recorded_at.to_rfc3339())
        .bind(&reading.source)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_temperature_reading(
        &self,
        reading: &NewTemperatureReading,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO temperature_readings
             (location_id, temperature, humidity, feels_like, recorded_at, source)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.location_id)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.feels_like)
        .bind(reading.recorded_at.to_rfc3339())
        .bind(&reading.source)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_alerts(
        &self,
        alerts: &[NewAlert],
        started_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let started_at = started_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for alert in alerts {
            sqlx::query(
                "INSERT INTO alerts (location_id, kind, severity, message, active, started_at)
                 VALUES (?, ?, ?, ?, 1, ?)",
            )
            .bind(alert.location_id)
            .bind(alert.kind.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .bind(&started_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(alerts.len() as u64)
    }

    async fn deactivate_active_alerts(&self, ended_at: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE alerts SET active = 0, ended_at = ? WHERE active = 1")
            .bind(ended_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn active_alerts(
        &self,
        location_id: Option<LocationId>,
    ) -> Result<Vec<Alert>, sqlx::Error> {
        let rows = match location_id {
            Some(id) => {
                sqlx::query(
                    "SELECT id, location_id, kind, severity, message, active, started_at, ended_at
                     FROM alerts
                     WHERE active = 1 AND location_id = ?
                     ORDER BY started_at DESC, id DESC",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, location_id, kind, severity, message, active, started_at, ended_at
                     FROM alerts
                     WHERE active = 1
                     ORDER BY started_at DESC, id DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().filter_map(alert_from_row).collect())
    }

    async fn latest_reading(
        &self,
        location_id: LocationId,
    ) -> Result<Option<Reading>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, location_id, aqi, pm25, pm10, o3, no2, so2, co, category, recorded_at, source
             FROM aqi_readings
             WHERE location_id = ?
             ORDER BY recorded_at DESC, id DESC
             LIMIT 1",
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(reading_from_row))
    }
}
