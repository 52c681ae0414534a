use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};

use crate::{
    error::LookupError,
    model::{Location, WeatherSnapshot},
};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const EXCLUDE_BLOCKS: &str = "minutely,alerts";
const UNITS: &str = "imperial";

/// Asynchronous contract for zip-code resolution and forecast retrieval.
///
/// One implementation talks to OpenWeatherMap; tests substitute scripted
/// doubles. Both operations are pure request/response: no retries, no
/// caching, no shared mutable state across calls.
#[async_trait]
pub trait WeatherApi: Send + Sync + Debug {
    /// Resolve a zip/country pair to coordinates via the geocoding API.
    async fn resolve_zip(&self, zip: &str, country: &str) -> Result<Location, LookupError>;

    /// Fetch the forecast for a coordinate pair.
    async fn fetch_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, LookupError>;
}

/// HTTP client for the OpenWeatherMap geocoding and One Call 3.0 APIs.
#[derive(Debug, Clone)]
pub struct OwmClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OwmClient {
    /// Client pointed at the production OpenWeatherMap API.
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, LookupError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Client with a custom base URL, for pointing tests at a mock server.
    pub fn with_base_url(
        api_key: String,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, LookupError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_zip(&self, zip: &str, country: &str) -> Result<Location, LookupError> {
        let url = format!("{}/geo/1.0/zip", self.base_url);
        let zip_query = format!("{zip},{country}");

        let res = self
            .http
            .get(&url)
            .query(&[("zip", zip_query.as_str()), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            return Err(LookupError::Http {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let parsed: ZipResponse =
            serde_json::from_str(&body).map_err(|source| LookupError::Malformed {
                context: "geocoding response",
                source,
            })?;

        Ok(Location::new(
            parsed.zip,
            parsed.name,
            parsed.lat,
            parsed.lon,
            parsed.country,
        ))
    }

    async fn get_onecall(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, LookupError> {
        let url = format!("{}/data/3.0/onecall", self.base_url);
        let lat = lat.to_string();
        let lon = lon.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("exclude", EXCLUDE_BLOCKS),
                ("appid", self.api_key.as_str()),
                ("units", UNITS),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(LookupError::Http {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| LookupError::Malformed {
            context: "forecast response",
            source,
        })
    }
}

/// Geocoding response shape from `geo/1.0/zip`.
#[derive(Debug, Deserialize)]
struct ZipResponse {
    zip: String,
    name: String,
    lat: f64,
    lon: f64,
    country: String,
}

#[async_trait]
impl WeatherApi for OwmClient {
    async fn resolve_zip(&self, zip: &str, country: &str) -> Result<Location, LookupError> {
        tracing::debug!(zip, country, "resolving zip code");
        self.get_zip(zip, country).await
    }

    async fn fetch_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, LookupError> {
        tracing::debug!(lat, lon, "fetching forecast");
        self.get_onecall(lat, lon).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Back off to a char boundary so multibyte text cannot panic the slice.
    let end = (0..=MAX)
        .rev()
        .find(|i| body.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &body[..end])
}
