use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a fetch is keyed by: a city name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl WeatherQuery {
    pub fn city(name: impl Into<String>) -> Self {
        WeatherQuery::City(name.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        WeatherQuery::Coordinates { lat, lon }
    }
}

impl std::fmt::Display for WeatherQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherQuery::City(name) => f.write_str(name),
            WeatherQuery::Coordinates { lat, lon } => write!(f, "{lat:.4},{lon:.4}"),
        }
    }
}

/// The two independently tracked fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Weather,
    Forecast,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Weather => "weather",
            FetchKind::Forecast => "forecast",
        }
    }
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub description: String,
    pub icon_code: String,
}

/// Current conditions for one place, in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub country_code: String,
    pub conditions: Vec<Condition>,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure_hpa: u32,
    pub wind_speed: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherSnapshot {
    /// The condition a display shows; providers list the dominant one first.
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }

    /// "London, GB", or just the name when the provider returned no country.
    pub fn place(&self) -> String {
        match (self.city_name.is_empty(), self.country_code.is_empty()) {
            (false, false) => format!("{}, {}", self.city_name, self.country_code),
            (false, true) => self.city_name.clone(),
            (true, false) => self.country_code.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: u8,
    pub conditions: Vec<Condition>,
}

impl ForecastEntry {
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub entries: Vec<ForecastEntry>,
}

impl ForecastSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Published state of one fetch kind.
///
/// There is no `Idle` variant: before the first fetch nothing is published,
/// which the status channel models as `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> FetchStatus<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            FetchStatus::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Trim user input into a city name; `None` when nothing is left.
///
/// The favorites store does not validate names itself, so callers run input
/// through this first.
pub fn normalize_city(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
