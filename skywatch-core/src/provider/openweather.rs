use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::WeatherError,
    model::{CitySuggestion, CurrentConditions, ForecastEntry, Reading},
};

use super::{FORECAST_SAMPLES, MIN_QUERY_LEN, WeatherProvider};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeather implementation of [`WeatherProvider`], using the free
/// `/weather`, `/find` and `/forecast` endpoints with metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Network(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
            http,
        })
    }

    /// Point the provider at a different endpoint, e.g. a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, endpoint: &str, q: &str) -> Result<String, WeatherError> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", q),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.map_transport(e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(WeatherError::NotFound(q.to_string()));
        }
        if !status.is_success() {
            return Err(WeatherError::Network(format!(
                "OpenWeather {endpoint} request failed with status {status}: {}",
                truncate_body(&body),
            )));
        }

        Ok(body)
    }

    fn map_transport(&self, err: reqwest::Error) -> WeatherError {
        if err.is_timeout() {
            WeatherError::Timeout(self.timeout)
        } else {
            WeatherError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    id: i64,
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwFindEntry {
    id: i64,
    name: String,
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwFindResponse {
    list: Vec<OwFindEntry>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, city_name: &str) -> Result<CurrentConditions, WeatherError> {
        let body = self.get("weather", city_name).await?;

        let parsed: OwCurrentResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::Network(format!("failed to parse OpenWeather current JSON: {e}"))
        })?;

        let icon = parsed
            .weather
            .first()
            .map(|w| w.icon.clone())
            .unwrap_or_default();

        Ok(CurrentConditions {
            city_id: parsed.id,
            city_name: parsed.name,
            observed_at: unix_to_utc(parsed.dt),
            reading: Reading {
                temperature_c: parsed.main.temp,
                humidity_pct: parsed.main.humidity,
                icon,
            },
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(WeatherError::InvalidQuery {
                query: query.to_string(),
                min_len: MIN_QUERY_LEN,
            });
        }

        let body = self.get("find", query).await?;

        let parsed: OwFindResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::Network(format!("failed to parse OpenWeather find JSON: {e}"))
        })?;

        Ok(parsed
            .list
            .into_iter()
            .map(|entry| CitySuggestion {
                id: entry.id,
                name: entry.name,
                country: entry.sys.country,
            })
            .collect())
    }

    async fn forecast(&self, city_name: &str) -> Result<Vec<ForecastEntry>, WeatherError> {
        let body = self.get("forecast", city_name).await?;

        let parsed: OwForecastResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::Network(format!("failed to parse OpenWeather forecast JSON: {e}"))
        })?;

        Ok(parsed
            .list
            .into_iter()
            .take(FORECAST_SAMPLES)
            .map(|entry| ForecastEntry {
                time: unix_to_utc(entry.dt),
                temperature_c: entry.main.temp,
                humidity_pct: entry.main.humidity,
            })
            .collect())
    }
}

fn unix_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        // never cut inside a multi-byte character
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new("KEY".to_string(), Duration::from_secs(5))
            .expect("client must build")
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn current_parses_identity_and_reading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Warsaw"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "id": 756135,
                    "name": "Warsaw",
                    "dt": 1700000000,
                    "main": { "temp": 7.5, "humidity": 81 },
                    "weather": [ { "icon": "04d", "description": "broken clouds" } ]
                }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let conditions = provider(&server).current("Warsaw").await.expect("must parse");

        assert_eq!(conditions.city_id, 756135);
        assert_eq!(conditions.city_name, "Warsaw");
        assert_eq!(conditions.reading.temperature_c, 7.5);
        assert_eq!(conditions.reading.humidity_pct, 81);
        assert_eq!(conditions.reading.icon, "04d");
        assert_eq!(conditions.observed_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn current_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(
                r#"{"cod":"404","message":"city not found"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let err = provider(&server).current("Nowhere").await.unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(city) if city == "Nowhere"));
    }

    #[tokio::test]
    async fn current_maps_server_error_to_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = provider(&server).current("Warsaw").await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(msg) if msg.contains("500")));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        // 199 ASCII bytes, then a two-byte character straddling byte 200
        let body = format!("{}żółć", "x".repeat(199));

        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(!truncated.contains('ż'));
    }

    #[tokio::test]
    async fn multibyte_error_body_still_yields_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string(format!("{}ż", "x".repeat(199))),
            )
            .mount(&server)
            .await;

        let err = provider(&server).current("Warsaw").await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn search_maps_find_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/find"))
            .and(query_param("q", "War"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "list": [
                        { "id": 756135, "name": "Warsaw", "sys": { "country": "PL" } },
                        { "id": 4791160, "name": "Warrenton", "sys": { "country": "US" } }
                    ]
                }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let hits = provider(&server).search("War").await.expect("must parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 756135);
        assert_eq!(hits[0].country, "PL");
    }

    #[tokio::test]
    async fn search_rejects_short_query_without_network() {
        // no mock server mounted: a network call would fail loudly
        let provider =
            OpenWeatherProvider::new("KEY".to_string(), Duration::from_secs(5)).expect("client");

        let err = provider.search("a").await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidQuery { min_len: 2, .. }));
    }

    #[tokio::test]
    async fn forecast_caps_samples_at_five() {
        let entries: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"{{ "dt": {}, "main": {{ "temp": {}.0, "humidity": 70 }} }}"#,
                    1_700_000_000 + i * 10_800,
                    i
                )
            })
            .collect();
        let body = format!(r#"{{ "list": [{}] }}"#, entries.join(","));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let samples = provider(&server).forecast("Warsaw").await.expect("must parse");
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].temperature_c, 0.0);
        assert_eq!(samples[4].temperature_c, 4.0);
    }
}
