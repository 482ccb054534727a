//! Plain-text rendering of snapshots.

use chrono::{DateTime, Utc};
use weather_core::{ForecastEntry, ForecastSnapshot, WeatherSnapshot};

/// "Nov 14, Tue", as shown in the forecast list.
pub fn forecast_date(ts: DateTime<Utc>) -> String {
    ts.format("%b %d, %a").to_string()
}

/// "Nov 14, 10:13 PM", as shown next to "Last Updated".
pub fn last_updated(ts: DateTime<Utc>) -> String {
    ts.format("%b %d, %-I:%M %p").to_string()
}

pub fn weather(snap: &WeatherSnapshot) -> String {
    let description = snap
        .primary_condition()
        .map(|c| c.description.as_str())
        .unwrap_or("unknown");

    let mut lines = vec![
        snap.place(),
        format!("{:.1}°C, {}", snap.temperature, description),
        format!("Feels like: {:.1}°C", snap.feels_like),
        format!("Min: {:.1}°C | Max: {:.1}°C", snap.temp_min, snap.temp_max),
        format!("Humidity: {}%", snap.humidity),
        format!("Pressure: {} hPa", snap.pressure_hpa),
    ];
    if let Some(speed) = snap.wind_speed {
        lines.push(format!("Wind Speed: {speed:.1} m/s"));
    }
    if let Some(ts) = snap.observed_at {
        lines.push(format!("Last Updated: {} UTC", last_updated(ts)));
    }

    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

fn forecast_line(entry: &ForecastEntry) -> String {
    let description = entry
        .primary_condition()
        .map(|c| c.description.as_str())
        .unwrap_or("-");
    format!(
        "{} {}  {:>5.1}°C  {:>3}%  {}",
        forecast_date(entry.timestamp),
        entry.timestamp.format("%H:%M"),
        entry.temperature,
        entry.humidity,
        description
    )
}

pub fn forecast(snap: &ForecastSnapshot) -> String {
    if snap.is_empty() {
        return "No forecast data".to_string();
    }
    snap.entries.iter().map(forecast_line).collect::<Vec<_>>().join("\n")
}
