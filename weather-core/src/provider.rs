use crate::{
    Config, FetchError,
    model::{ForecastSnapshot, WeatherQuery, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

pub mod openweather;

const USER_AGENT: &str = concat!("weather-core/", env!("CARGO_PKG_VERSION"));

/// Source of weather data. The fetch controller only talks to this trait, so
/// tests can substitute a scripted provider for the HTTP one.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, FetchError>;

    async fn forecast(&self, query: &WeatherQuery) -> Result<ForecastSnapshot, FetchError>;
}

/// Build the shared HTTP client once from config.
pub fn http_client_from_config(config: &Config) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<OpenWeatherProvider> {
    let api_key = config.require_api_key()?;
    let http = http_client_from_config(config)?;

    Ok(OpenWeatherProvider::new(api_key.to_owned(), http).with_base_url(config.base_url()))
}
