use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use tokio::{runtime::Handle, sync::broadcast};
use weather_core::{
    Config, FavoritesStore, FetchHandle, FetchStatus, Published, StorageError,
    WeatherFetchController, WeatherQuery, WeatherSnapshot, normalize_city, provider_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Show current weather for a city or a coordinate pair.
    Show {
        /// City name, e.g. "London" or "New York".
        #[arg(required_unless_present = "lat")]
        city: Option<String>,

        /// Latitude in decimal degrees.
        #[arg(long, allow_negative_numbers = true, requires = "lon", conflicts_with = "city")]
        lat: Option<f64>,

        /// Longitude in decimal degrees.
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Show the multi-day forecast for a city.
    Forecast {
        /// City name.
        city: String,
    },

    /// Manage favorite cities.
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorite cities.
    List,
    /// Add a city to favorites.
    Add { city: String },
    /// Remove a city from favorites.
    Remove { city: String },
    /// Add the city if absent, remove it if present.
    Toggle { city: String },
    /// Choose a favorite interactively and show its weather and forecast.
    Pick,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Show { city, lat, lon } => {
                let query = match (city, lat, lon) {
                    (_, Some(lat), Some(lon)) => WeatherQuery::coordinates(lat, lon),
                    (Some(city), _, _) => WeatherQuery::City(require_city(&city)?),
                    _ => bail!("Please enter a city name or both --lat and --lon"),
                };
                show_weather(&config, query).await
            }
            Command::Forecast { city } => {
                let city = require_city(&city)?;
                show_forecast(&config, WeatherQuery::City(city)).await
            }
            Command::Favorites { action } => favorites(&config, action).await,
        }
    }
}

fn require_city(input: &str) -> anyhow::Result<String> {
    normalize_city(input).ok_or_else(|| anyhow!("Please enter a city name"))
}

fn controller(config: &Config) -> anyhow::Result<WeatherFetchController> {
    let provider = provider_from_config(config)?;
    Ok(WeatherFetchController::with_policy(
        Arc::new(provider),
        Handle::current(),
        config.overlap_policy(),
    ))
}

fn open_favorites(config: &Config) -> anyhow::Result<FavoritesStore> {
    let path = config.database_path()?;
    FavoritesStore::open(&path)
        .with_context(|| format!("Failed to open favorites database: {}", path.display()))
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    let key = key.trim();
    if key.is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(key.to_string());
    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Print each published state of one invocation until it reaches a terminal one.
async fn follow<T: Clone>(
    events: &mut broadcast::Receiver<Published<T>>,
    handle: FetchHandle<T>,
    what: &str,
) -> anyhow::Result<T> {
    let seq = handle.seq();

    loop {
        match events.recv().await {
            Ok(published) if published.seq == seq => match published.status {
                FetchStatus::Loading => eprintln!("Loading {what}..."),
                FetchStatus::Success(value) => return Ok(value),
                FetchStatus::Error(message) => return Err(anyhow!(message)),
            },
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "status events lagged, waiting on handle");
                break;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    match handle.wait().await {
        FetchStatus::Success(value) => Ok(value),
        FetchStatus::Error(message) => Err(anyhow!(message)),
        FetchStatus::Loading => Err(anyhow!("{what} finished without a result")),
    }
}

async fn show_weather(config: &Config, query: WeatherQuery) -> anyhow::Result<()> {
    let ctl = controller(config)?;
    let mut events = ctl.weather_status().subscribe();
    let handle = ctl.fetch_weather(query.clone());

    let snap = follow(&mut events, handle, &format!("weather for {query}")).await?;
    println!("{}", render::weather(&snap));

    match open_favorites(config).and_then(|store| Ok(favorite_name(&store, &snap)?)) {
        Ok(Some(city)) => println!("★ {city} is a favorite"),
        Ok(None) => {}
        Err(err) => tracing::warn!("Could not check favorites: {err:#}"),
    }
    Ok(())
}

/// The resolved city name if it is stored as a favorite. Favorites are keyed
/// by the name the provider returns, not by what the user typed; a nameless
/// result (open water by coordinates) is never a favorite.
fn favorite_name<'a>(
    store: &FavoritesStore,
    snap: &'a WeatherSnapshot,
) -> Result<Option<&'a str>, StorageError> {
    let city = snap.city_name.trim();
    if city.is_empty() {
        return Ok(None);
    }
    Ok(store.contains(city)?.then_some(city))
}

async fn show_forecast(config: &Config, query: WeatherQuery) -> anyhow::Result<()> {
    let ctl = controller(config)?;
    let mut events = ctl.forecast_status().subscribe();
    let handle = ctl.fetch_forecast(query.clone());

    let forecast = follow(&mut events, handle, &format!("forecast for {query}")).await?;
    println!("Forecast for {query}");
    println!("{}", render::forecast(&forecast));
    Ok(())
}

async fn favorites(config: &Config, action: FavoritesCommand) -> anyhow::Result<()> {
    let store = open_favorites(config)?;

    match action {
        FavoritesCommand::List => {
            let cities = store.list_all()?;
            if cities.is_empty() {
                println!("No favorite cities added");
            }
            for city in cities {
                println!("{city}");
            }
        }
        FavoritesCommand::Add { city } => {
            let city = require_city(&city)?;
            if store.add(&city)? {
                println!("{city} added to favorites");
            } else {
                println!("{city} is already a favorite");
            }
        }
        FavoritesCommand::Remove { city } => {
            let city = require_city(&city)?;
            if store.remove(&city)? {
                println!("{city} removed from favorites");
            } else {
                println!("{city} is not a favorite");
            }
        }
        FavoritesCommand::Toggle { city } => {
            let city = require_city(&city)?;
            if store.toggle(&city)? {
                println!("{city} added to favorites");
            } else {
                println!("{city} removed from favorites");
            }
        }
        FavoritesCommand::Pick => {
            let cities = store.list_all()?;
            if cities.is_empty() {
                println!("No favorite cities added");
                return Ok(());
            }
            let city = Select::new("Select Favorite City", cities)
                .prompt()
                .context("No city selected")?;
            show_weather(config, WeatherQuery::City(city.clone())).await?;
            show_forecast(config, WeatherQuery::City(city)).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn show_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["weather", "show", "--lat", "-33.87", "--lon", "151.21"])
            .expect("should parse");
        match cli.command {
            Command::Show { city, lat, lon } => {
                assert_eq!(city, None);
                assert_eq!(lat, Some(-33.87));
                assert_eq!(lon, Some(151.21));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn show_rejects_lat_without_lon() {
        assert!(Cli::try_parse_from(["weather", "show", "--lat", "10"]).is_err());
    }

    #[test]
    fn show_requires_city_or_coordinates() {
        assert!(Cli::try_parse_from(["weather", "show"]).is_err());
    }

    #[test]
    fn favorites_subcommands_parse() {
        let cli = Cli::try_parse_from(["weather", "favorites", "add", "New York"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Favorites { action: FavoritesCommand::Add { ref city } } if city == "New York"
        ));
    }

    fn snapshot(city_name: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city_name: city_name.to_string(),
            country_code: "GB".to_string(),
            conditions: Vec::new(),
            temperature: 12.0,
            feels_like: 11.0,
            temp_min: 10.0,
            temp_max: 14.0,
            humidity: 70,
            pressure_hpa: 1012,
            wind_speed: None,
            observed_at: None,
        }
    }

    #[test]
    fn favorite_check_uses_resolved_city_name() {
        let store = FavoritesStore::in_memory().unwrap();
        store.add("London").unwrap();

        // User typed "london"; the provider resolved it to "London".
        assert_eq!(favorite_name(&store, &snapshot("London")).unwrap(), Some("London"));
        assert_eq!(favorite_name(&store, &snapshot("Paris")).unwrap(), None);
    }

    #[test]
    fn nameless_result_is_never_a_favorite() {
        let store = FavoritesStore::in_memory().unwrap();
        store.add("").ok();

        assert_eq!(favorite_name(&store, &snapshot("")).unwrap(), None);
        assert_eq!(favorite_name(&store, &snapshot("  ")).unwrap(), None);
    }

    #[test]
    fn pick_parses() {
        let cli = Cli::try_parse_from(["weather", "favorites", "pick"]).unwrap();
        assert!(matches!(cli.command, Command::Favorites { action: FavoritesCommand::Pick }));
    }

    #[test]
    fn require_city_rejects_blank_input() {
        assert!(require_city("   ").is_err());
        assert_eq!(require_city(" Oslo ").unwrap(), "Oslo");
    }
}
