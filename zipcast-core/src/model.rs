use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as epoch milliseconds, the unit used for `searchedAt`.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A resolved location, as stored in the `saved_locations` table.
///
/// The zip code is the sole uniqueness key; at most one row exists per zip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub zip: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[sqlx(rename = "searchedAt")]
    #[serde(default)]
    pub searched_at: i64,
    #[sqlx(rename = "isFavorite")]
    #[serde(default)]
    pub favorite: bool,
}

impl Location {
    /// A freshly resolved location: searched now, not a favorite.
    pub fn new(zip: String, name: String, lat: f64, lon: f64, country: String) -> Self {
        Self {
            zip,
            name,
            lat,
            lon,
            country,
            searched_at: now_millis(),
            favorite: false,
        }
    }

    /// Display-only location for coordinate lookups. It carries no zip code
    /// and is never written to the store.
    pub fn unsaved(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            zip: String::new(),
            name: name.into(),
            lat,
            lon,
            country: String::new(),
            searched_at: now_millis(),
            favorite: false,
        }
    }
}

/// Short weather-condition descriptor attached to every forecast block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Current conditions block of a One Call response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub dt: i64,
    pub sunrise: i64,
    pub sunset: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: u32,
    pub humidity: u32,
    pub dew_point: f64,
    pub uvi: f64,
    pub clouds: u32,
    pub visibility: Option<i64>,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub wind_gust: Option<f64>,
    pub weather: Vec<Condition>,
}

/// One hourly forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub dt: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: u32,
    pub humidity: u32,
    pub dew_point: f64,
    pub uvi: f64,
    pub clouds: u32,
    pub visibility: Option<i64>,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub wind_gust: Option<f64>,
    pub weather: Vec<Condition>,
    pub pop: f64,
}

/// Per-day temperature breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTemperature {
    pub day: f64,
    pub min: f64,
    pub max: f64,
    pub night: f64,
    pub eve: f64,
    pub morn: f64,
}

/// Per-day feels-like breakdown (the API carries no min/max here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeelsLike {
    pub day: f64,
    pub night: f64,
    pub eve: f64,
    pub morn: f64,
}

/// One daily forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub dt: i64,
    pub sunrise: i64,
    pub sunset: i64,
    pub moonrise: i64,
    pub moonset: i64,
    pub moon_phase: f64,
    pub summary: Option<String>,
    pub temp: DailyTemperature,
    pub feels_like: DailyFeelsLike,
    pub pressure: u32,
    pub humidity: u32,
    pub dew_point: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub wind_gust: Option<f64>,
    pub weather: Vec<Condition>,
    pub clouds: u32,
    pub pop: f64,
    pub uvi: f64,
}

/// A point-in-time forecast for one coordinate pair, parsed from the
/// One Call 3.0 response. Immutable once constructed; held transiently for
/// display and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub timezone_offset: i64,
    pub current: Option<CurrentConditions>,
    #[serde(default)]
    pub hourly: Vec<HourlyForecast>,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
}

impl WeatherSnapshot {
    /// Description of the current condition, when the response carried one.
    pub fn current_condition(&self) -> Option<&str> {
        self.current
            .as_ref()
            .and_then(|c| c.weather.first())
            .map(|w| w.description.as_str())
    }
}

/// A fully successful lookup: the forecast plus the location it was
/// resolved for. For zip lookups `location` is the row as persisted
/// (favorite flag merged from any prior row); for coordinate lookups it is
/// synthetic and absent from the store.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub location: Location,
    pub snapshot: WeatherSnapshot,
}
