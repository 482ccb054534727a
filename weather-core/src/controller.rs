//! Turns weather queries into published [`FetchStatus`] values.
//!
//! Each `fetch_*` call publishes `Loading` before returning, spawns the
//! provider request on the runtime, and publishes exactly one terminal status
//! when it finishes (subject to the channel's [`OverlapPolicy`]). Weather and
//! forecast have separate channels and never affect each other.

use std::{future::Future, sync::Arc};

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
    FetchError,
    model::{FetchKind, FetchStatus, ForecastSnapshot, WeatherQuery, WeatherSnapshot},
    provider::WeatherProvider,
    status::{OverlapPolicy, StatusChannel},
};

/// One in-flight invocation.
#[derive(Debug)]
pub struct FetchHandle<T> {
    seq: u64,
    task: JoinHandle<FetchStatus<T>>,
}

impl<T> FetchHandle<T> {
    /// Sequence number this invocation was published under.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolve to this invocation's own terminal status, whether or not the
    /// channel accepted it.
    pub async fn wait(self) -> FetchStatus<T> {
        match self.task.await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(seq = self.seq, "fetch task failed: {err}");
                FetchStatus::Error(format!("Fetch task failed: {err}"))
            }
        }
    }
}

#[derive(Debug)]
pub struct WeatherFetchController {
    provider: Arc<dyn WeatherProvider>,
    runtime: Handle,
    weather: Arc<StatusChannel<WeatherSnapshot>>,
    forecast: Arc<StatusChannel<ForecastSnapshot>>,
}

impl WeatherFetchController {
    /// `runtime` is where requests run; the caller never blocks on them.
    pub fn new(provider: Arc<dyn WeatherProvider>, runtime: Handle) -> Self {
        Self::with_policy(provider, runtime, OverlapPolicy::default())
    }

    pub fn with_policy(
        provider: Arc<dyn WeatherProvider>,
        runtime: Handle,
        policy: OverlapPolicy,
    ) -> Self {
        Self {
            provider,
            runtime,
            weather: Arc::new(StatusChannel::new(FetchKind::Weather, policy)),
            forecast: Arc::new(StatusChannel::new(FetchKind::Forecast, policy)),
        }
    }

    pub fn weather_status(&self) -> &StatusChannel<WeatherSnapshot> {
        &self.weather
    }

    pub fn forecast_status(&self) -> &StatusChannel<ForecastSnapshot> {
        &self.forecast
    }

    pub fn fetch_weather_by_city(&self, city: &str) -> FetchHandle<WeatherSnapshot> {
        self.fetch_weather(WeatherQuery::city(city))
    }

    pub fn fetch_weather_by_coordinates(&self, lat: f64, lon: f64) -> FetchHandle<WeatherSnapshot> {
        self.fetch_weather(WeatherQuery::coordinates(lat, lon))
    }

    pub fn fetch_forecast_by_city(&self, city: &str) -> FetchHandle<ForecastSnapshot> {
        self.fetch_forecast(WeatherQuery::city(city))
    }

    pub fn fetch_forecast_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> FetchHandle<ForecastSnapshot> {
        self.fetch_forecast(WeatherQuery::coordinates(lat, lon))
    }

    pub fn fetch_weather(&self, query: WeatherQuery) -> FetchHandle<WeatherSnapshot> {
        let provider = Arc::clone(&self.provider);
        self.spawn_fetch(&self.weather, query, move |q| async move {
            provider.current_weather(&q).await
        })
    }

    pub fn fetch_forecast(&self, query: WeatherQuery) -> FetchHandle<ForecastSnapshot> {
        let provider = Arc::clone(&self.provider);
        self.spawn_fetch(&self.forecast, query, move |q| async move {
            provider.forecast(&q).await
        })
    }

    fn spawn_fetch<T, F, Fut>(
        &self,
        channel: &Arc<StatusChannel<T>>,
        query: WeatherQuery,
        request: F,
    ) -> FetchHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(WeatherQuery) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let ticket = channel.begin();
        let seq = ticket.seq();
        let kind = channel.kind();
        tracing::debug!(%kind, seq, %query, "fetch issued");

        let channel = Arc::clone(channel);
        let task = self.runtime.spawn(async move {
            // If `request` panics or the task is cancelled, dropping the
            // ticket publishes the error instead.
            let outcome = request(query).await.map_err(|err| {
                tracing::warn!(%kind, seq, "fetch failed: {err}");
                err.to_string()
            });
            let status = match &outcome {
                Ok(value) => FetchStatus::Success(value.clone()),
                Err(message) => FetchStatus::Error(message.clone()),
            };
            channel.complete(ticket, outcome);
            status
        });

        FetchHandle { seq, task }
    }
}
