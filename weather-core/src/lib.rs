//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather provider seam and its OpenWeather implementation
//! - `WeatherFetchController`, which publishes Loading/Success/Error per fetch kind
//! - `FavoritesStore`, a small SQLite-backed list of favorite cities
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod controller;
pub mod error;
pub mod favorites;
pub mod model;
pub mod provider;
pub mod status;

pub use config::Config;
pub use controller::{FetchHandle, WeatherFetchController};
pub use error::{FetchError, StorageError};
pub use favorites::FavoritesStore;
pub use model::{
    Condition, FetchKind, FetchStatus, ForecastEntry, ForecastSnapshot, WeatherQuery,
    WeatherSnapshot, normalize_city,
};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use status::{OverlapPolicy, Published, StatusChannel};
