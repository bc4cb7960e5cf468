use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::ingest::error::FetchError;
use crate::ingest::source::{FetchResult, PollutionSource};
use crate::ingest::types::{Coordinates, Pollutants, PollutionSnapshot};

pub const DEFAULT_WAQI_URL: &str = "https://api.waqi.info";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the World Air Quality Index geo feed.
#[derive(Clone)]
pub struct WaqiClient {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl WaqiClient {
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

    pub async fn fetch_feed(&self, coordinates: Coordinates, token: &str) -> FetchResult<Value> {
        let url = format!(
            "{}/feed/geo:{};{}/",
            self.base_url, coordinates.latitude, coordinates.longitude
        );

        let response = self
            .http
            .get(&url)
            .query(&[("token", token)])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Validate a feed payload and extract the snapshot.
///
/// The feed must carry `"status": "ok"` and a numeric `data.aqi`. Stations
/// without a current reading report `"aqi": "-"`, which is treated as no data.
pub fn parse_feed(feed: &Value) -> FetchResult<PollutionSnapshot> {
    let status = feed.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "ok" {
        return Err(FetchError::no_data(format!("feed status is {:?}", status)));
    }

    let data = feed
        .get("data")
        .ok_or_else(|| FetchError::no_data("feed has no data block"))?;

    let aqi = data
        .get("aqi")
        .and_then(numeric)
        .ok_or_else(|| FetchError::no_data("feed has no numeric aqi"))?;

    let iaqi = data.get("iaqi");
    let component = |name: &str| {
        iaqi.and_then(|block| block.get(name))
            .and_then(|entry| entry.get("v"))
            .and_then(Value::as_f64)
    };

    // Round up: with integer breakpoints and thresholds, `v <= b` holds
    // exactly when `ceil(v) <= b`, so a fractional index lands in the same
    // category and alert tier it would have as a float.
    Ok(PollutionSnapshot {
        aqi: aqi.ceil() as i32,
        pollutants: Pollutants {
            pm25: component("pm25"),
            pm10: component("pm10"),
            o3: component("o3"),
            no2: component("no2"),
            so2: component("so2"),
            co: component("co"),
        },
    })
}

fn numeric(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

#[async_trait]
impl PollutionSource for WaqiClient {
    async fn fetch_pollution(
        &self,
        coordinates: Coordinates,
        token: &str,
    ) -> FetchResult<PollutionSnapshot> {
        let feed = self.fetch_feed(coordinates, token).await?;
        parse_feed(&feed)
    }

    fn provider_name(&self) -> &str {
        "WAQI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path_regex, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn delhi() -> Coordinates {
        Coordinates::new(28.61, 77.21)
    }

    #[test]
    fn parse_feed_extracts_index_and_pollutants() {
        let feed = json!({
            "status": "ok",
            "data": {
                "aqi": 182,
                "iaqi": {
                    "pm25": { "v": 182.0 },
                    "no2": { "v": 21.4 },
                    "t": { "v": 31 }
                }
            }
        });

        let snapshot = parse_feed(&feed).unwrap();
        assert_eq!(snapshot.aqi, 182);
        assert_eq!(snapshot.pollutants.pm25, Some(182.0));
        assert_eq!(snapshot.pollutants.no2, Some(21.4));
        assert_eq!(snapshot.pollutants.pm10, None);
        assert_eq!(snapshot.pollutants.co, None);
    }

    #[test]
    fn parse_feed_without_iaqi_has_no_pollutants() {
        let snapshot = parse_feed(&json!({ "status": "ok", "data": { "aqi": 42 } })).unwrap();
        assert_eq!(snapshot, PollutionSnapshot::new(42));
    }

    #[test]
    fn parse_feed_rejects_error_status() {
        let feed = json!({ "status": "error", "data": "Unknown station" });
        assert!(matches!(parse_feed(&feed), Err(FetchError::NoData { .. })));
    }

    #[test]
    fn parse_feed_rejects_placeholder_index() {
        let feed = json!({ "status": "ok", "data": { "aqi": "-" } });
        assert!(matches!(parse_feed(&feed), Err(FetchError::NoData { .. })));
    }

    #[test]
    fn parse_feed_rejects_missing_status() {
        assert!(parse_feed(&json!({ "data": { "aqi": 10 } })).is_err());
    }

    #[tokio::test]
    async fn fetch_pollution_reads_mocked_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/feed/geo:28\.61;77\.21/$"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": { "aqi": 157, "iaqi": { "pm10": { "v": 88 } } }
            })))
            .mount(&server)
            .await;

        let client = WaqiClient::new(server.uri());
        let snapshot = client.fetch_pollution(delhi(), "secret").await.unwrap();

        assert_eq!(snapshot.aqi, 157);
        assert_eq!(snapshot.pollutants.pm10, Some(88.0));
    }

    #[tokio::test]
    async fn fetch_pollution_maps_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = WaqiClient::new(server.uri());
        let result = client.fetch_pollution(delhi(), "secret").await;

        assert!(matches!(result, Err(FetchError::Status { status: 503 })));
    }

    #[tokio::test]
    async fn fetch_pollution_maps_invalid_json_to_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "text/html"))
            .mount(&server)
            .await;

        let client = WaqiClient::new(server.uri());
        let result = client.fetch_pollution(delhi(), "secret").await;

        assert!(matches!(result, Err(FetchError::Format { .. })));
    }

    #[test]
    fn fractional_index_keeps_its_tier() {
        let feed = |aqi: f64| json!({ "status": "ok", "data": { "aqi": aqi } });

        let above = parse_feed(&feed(150.4)).unwrap();
        assert_eq!(above.aqi, 151);
        let alerts = crate::ingest::generate_alerts(above.aqi, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, crate::ingest::AlertKind::HealthAdvisory);

        let at_bound = parse_feed(&feed(50.0)).unwrap();
        assert_eq!(at_bound.aqi, 50);
        assert_eq!(crate::ingest::classify(at_bound.aqi), crate::ingest::AqiCategory::Good);
        assert_eq!(parse_feed(&feed(50.2)).unwrap().aqi, 51);
    }

    #[tokio::test]
    async fn fetch_pollution_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "ok", "data": { "aqi": 1 } }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = WaqiClient::new(server.uri()).with_timeout(Duration::from_millis(50));
        let result = client.fetch_pollution(delhi(), "secret").await;

        assert!(matches!(result, Err(FetchError::Timeout)));
    }
}
