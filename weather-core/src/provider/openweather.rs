use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    FetchError,
    model::{Condition, ForecastEntry, ForecastSnapshot, WeatherQuery, WeatherSnapshot},
};

use super::WeatherProvider;

const UNITS: &str = "metric";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    /// `http` is shared; build it once and hand clones to whoever needs one.
    pub fn new(api_key: String, http: Client) -> Self {
        Self {
            api_key,
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &WeatherQuery,
    ) -> Result<R, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut params: Vec<(&str, String)> = match query {
            WeatherQuery::City(city) => vec![("q", city.clone())],
            WeatherQuery::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        };
        params.push(("appid", self.api_key.clone()));
        params.push(("units", UNITS.to_string()));

        tracing::debug!(endpoint, %query, "sending OpenWeather request");

        let res = self.http.get(&url).query(&params).send().await?;

        let status = res.status();
        let reason = status.canonical_reason().unwrap_or("Unknown").to_string();

        if !status.is_success() {
            // The status is the error; the body is only for the log.
            let body = res.text().await.unwrap_or_default();
            tracing::debug!(
                endpoint,
                status = status.as_u16(),
                body = %truncate_body(&body),
                "OpenWeather request failed"
            );
            return Err(FetchError::Http { status: status.as_u16(), reason });
        }

        let body = res.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody { status: status.as_u16(), reason });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    sys: Option<OwSys>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    main: OwMain,
    wind: Option<OwWind>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn conditions(weather: Vec<OwWeather>) -> Vec<Condition> {
    weather
        .into_iter()
        .map(|w| Condition { description: w.description, icon_code: w.icon })
        .collect()
}

impl OwCurrentResponse {
    /// Name and country are mandatory for city lookups; coordinate lookups
    /// over open water legitimately come back without them.
    fn into_snapshot(self, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError> {
        let city_name = self.name.filter(|n| !n.is_empty());
        let country_code = self.sys.and_then(|s| s.country).filter(|c| !c.is_empty());

        if let WeatherQuery::City(_) = query {
            if city_name.is_none() {
                return Err(FetchError::Malformed("missing city name".into()));
            }
            if country_code.is_none() {
                return Err(FetchError::Malformed("missing country code".into()));
            }
        }

        if self.weather.is_empty() {
            return Err(FetchError::Malformed("no weather conditions".into()));
        }

        Ok(WeatherSnapshot {
            city_name: city_name.unwrap_or_default(),
            country_code: country_code.unwrap_or_default(),
            conditions: conditions(self.weather),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed: self.wind.and_then(|w| w.speed),
            observed_at: self.dt.and_then(unix_to_utc),
        })
    }
}

impl OwForecastResponse {
    fn into_snapshot(self) -> Result<ForecastSnapshot, FetchError> {
        let entries = self
            .list
            .into_iter()
            .map(|entry| {
                let timestamp = unix_to_utc(entry.dt).ok_or_else(|| {
                    FetchError::Malformed(format!("invalid forecast timestamp {}", entry.dt))
                })?;
                Ok(ForecastEntry {
                    timestamp,
                    temperature: entry.main.temp,
                    humidity: entry.main.humidity,
                    conditions: conditions(entry.weather),
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(ForecastSnapshot { entries })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError> {
        let parsed: OwCurrentResponse = self.get_json("weather", query).await?;
        parsed.into_snapshot(query)
    }

    async fn forecast(&self, query: &WeatherQuery) -> Result<ForecastSnapshot, FetchError> {
        let parsed: OwForecastResponse = self.get_json("forecast", query).await?;
        parsed.into_snapshot()
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: &str = r#"{
        "coord": {"lon": -0.1257, "lat": 51.5085},
        "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
        "base": "stations",
        "main": {"temp": 11.5, "feels_like": 10.9, "temp_min": 10.1, "temp_max": 12.8,
                 "pressure": 1009, "humidity": 87},
        "visibility": 10000,
        "wind": {"speed": 4.6, "deg": 240},
        "dt": 1700000000,
        "sys": {"country": "GB", "sunrise": 1699946000, "sunset": 1699978000},
        "name": "London",
        "cod": 200
    }"#;

    fn parse_current(json: &str) -> OwCurrentResponse {
        serde_json::from_str(json).expect("fixture should parse")
    }

    #[test]
    fn decodes_current_weather_and_ignores_unknown_fields() {
        let snap = parse_current(LONDON).into_snapshot(&WeatherQuery::city("london")).unwrap();

        assert_eq!(snap.city_name, "London");
        assert_eq!(snap.country_code, "GB");
        assert_eq!(snap.primary_condition().unwrap().description, "light rain");
        assert_eq!(snap.pressure_hpa, 1009);
        assert_eq!(snap.humidity, 87);
        assert_eq!(snap.wind_speed, Some(4.6));
        assert_eq!(snap.observed_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn wind_and_timestamp_are_optional() {
        let json = r#"{
            "weather": [{"description": "clear sky", "icon": "01d"}],
            "main": {"temp": 20.0, "feels_like": 19.0, "temp_min": 18.0, "temp_max": 22.0,
                     "pressure": 1015, "humidity": 40},
            "sys": {"country": "FR"},
            "name": "Paris"
        }"#;
        let snap = parse_current(json).into_snapshot(&WeatherQuery::city("Paris")).unwrap();
        assert_eq!(snap.wind_speed, None);
        assert_eq!(snap.observed_at, None);
    }

    #[test]
    fn city_query_requires_name_and_country() {
        let json = r#"{
            "weather": [{"description": "clear sky", "icon": "01d"}],
            "main": {"temp": 20.0, "feels_like": 19.0, "temp_min": 18.0, "temp_max": 22.0,
                     "pressure": 1015, "humidity": 40},
            "name": "Paris"
        }"#;
        let err = parse_current(json).into_snapshot(&WeatherQuery::city("Paris")).unwrap_err();
        assert_eq!(err, FetchError::Malformed("missing country code".into()));
    }

    #[test]
    fn coordinate_query_tolerates_missing_place() {
        let json = r#"{
            "weather": [{"description": "overcast clouds", "icon": "04n"}],
            "main": {"temp": 3.0, "feels_like": 0.5, "temp_min": 3.0, "temp_max": 3.0,
                     "pressure": 990, "humidity": 95},
            "wind": {"speed": 12.0},
            "dt": 1700000000,
            "name": ""
        }"#;
        let snap = parse_current(json)
            .into_snapshot(&WeatherQuery::coordinates(-50.0, -30.0))
            .unwrap();
        assert_eq!(snap.city_name, "");
        assert_eq!(snap.wind_speed, Some(12.0));
    }

    #[test]
    fn empty_conditions_are_rejected() {
        let json = r#"{
            "weather": [],
            "main": {"temp": 20.0, "feels_like": 19.0, "temp_min": 18.0, "temp_max": 22.0,
                     "pressure": 1015, "humidity": 40},
            "sys": {"country": "FR"},
            "name": "Paris"
        }"#;
        let err = parse_current(json).into_snapshot(&WeatherQuery::city("Paris")).unwrap_err();
        assert!(err.to_string().contains("no weather conditions"));
    }

    #[test]
    fn missing_main_block_fails_to_decode() {
        let json = r#"{"weather": [{"description": "x", "icon": "01d"}], "name": "Paris"}"#;
        assert!(serde_json::from_str::<OwCurrentResponse>(json).is_err());
    }

    #[test]
    fn decodes_forecast_in_order() {
        let json = r#"{
            "cod": "200",
            "cnt": 2,
            "list": [
                {"dt": 1700010800, "main": {"temp": 9.5, "humidity": 80, "pressure": 1010},
                 "weather": [{"description": "broken clouds", "icon": "04d"}]},
                {"dt": 1700021600, "main": {"temp": 8.1, "humidity": 85},
                 "weather": [{"description": "light rain", "icon": "10n"}]}
            ],
            "city": {"name": "London", "country": "GB"}
        }"#;
        let parsed: OwForecastResponse = serde_json::from_str(json).unwrap();
        let forecast = parsed.into_snapshot().unwrap();

        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast.entries[0].timestamp.timestamp(), 1_700_010_800);
        assert_eq!(forecast.entries[1].primary_condition().unwrap().icon_code, "10n");
        assert_eq!(forecast.entries[1].humidity, 85);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
