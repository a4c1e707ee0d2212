//! Open-Meteo adapter (no credentials).
//!
//! Requests current conditions plus hourly and daily forecasts in one
//! call, asking the upstream for the caller's units directly. Condition
//! codes are WMO weather interpretation codes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use super::http::{endpoint, get_json, timed_health};
use super::{AdapterSettings, Capabilities, ProviderHealth, ProviderKind, WeatherProvider};
use crate::error::WeatherError;
use crate::model::{
    cardinal_direction, percent, round_speed, round_temperature, Condition, CurrentConditions,
    DailyEntry, HourlyEntry, UnifiedWeatherResponse, Units, WeatherRequest, MAX_DAILY_ENTRIES,
    MAX_HOURLY_ENTRIES,
};
use crate::server::HttpClient;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,wind_direction_10m";
const HOURLY_FIELDS: &str = "temperature_2m,weather_code,precipitation_probability";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";

pub struct OpenMeteoProvider {
    client: HttpClient,
    settings: AdapterSettings,
}

impl OpenMeteoProvider {
    #[must_use]
    pub const fn new(client: HttpClient, settings: AdapterSettings) -> Self {
        Self { client, settings }
    }
}

/// WMO weather interpretation code to the shared vocabulary.
#[must_use]
pub const fn condition_from_wmo(code: i64) -> Condition {
    match code {
        0 | 1 => Condition::Clear,
        2 => Condition::PartlyCloudy,
        3 => Condition::Overcast,
        45 | 48 => Condition::Fog,
        51..=57 => Condition::Drizzle,
        61..=67 => Condition::Rain,
        71..=77 | 85 | 86 => Condition::Snow,
        80..=82 => Condition::Showers,
        95..=99 => Condition::Thunderstorm,
        _ => Condition::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: OmCurrent,
    #[serde(default)]
    hourly: Option<OmHourly>,
    #[serde(default)]
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    weather_code: Option<i64>,
    wind_speed_10m: f64,
    #[serde(default)]
    wind_direction_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    weather_code: Vec<Option<i64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    weather_code: Vec<Option<i64>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

/// Open-Meteo reports times in GMT without an offset when `timezone=GMT`.
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn map_condition(code: Option<i64>) -> Condition {
    code.map_or(Condition::Unknown, condition_from_wmo)
}

fn map_response(raw: OmResponse, units: Units) -> UnifiedWeatherResponse {
    let current = CurrentConditions {
        temp: round_temperature(raw.current.temperature_2m),
        feels_like: round_temperature(raw.current.apparent_temperature),
        humidity: percent(raw.current.relative_humidity_2m),
        wind_speed: round_speed(raw.current.wind_speed_10m),
        wind_direction: cardinal_direction(raw.current.wind_direction_10m).to_string(),
        condition: map_condition(raw.current.weather_code),
    };

    let issued_at = parse_time(&raw.current.time);

    // The hourly series starts at midnight, not at the current hour
    let hourly = raw.hourly.map_or_else(Vec::new, |h| {
        h.time
            .iter()
            .enumerate()
            .filter_map(|(i, time)| {
                let temp = h.temperature_2m.get(i).copied().flatten()?;
                Some(HourlyEntry {
                    time: parse_time(time)?,
                    temp: round_temperature(temp),
                    condition: map_condition(h.weather_code.get(i).copied().flatten()),
                    precipitation_chance: h
                        .precipitation_probability
                        .get(i)
                        .copied()
                        .flatten()
                        .map(percent),
                })
            })
            .filter(|entry| issued_at.map_or(true, |now| entry.time >= now))
            .take(MAX_HOURLY_ENTRIES)
            .collect()
    });

    let daily = raw.daily.map_or_else(Vec::new, |d| {
        d.time
            .iter()
            .enumerate()
            .filter_map(|(i, date)| {
                let max = d.temperature_2m_max.get(i).copied().flatten()?;
                let min = d.temperature_2m_min.get(i).copied().flatten()?;
                Some(DailyEntry {
                    date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?,
                    temp_max: round_temperature(max),
                    temp_min: round_temperature(min),
                    condition: map_condition(d.weather_code.get(i).copied().flatten()),
                    precipitation_chance: d
                        .precipitation_probability_max
                        .get(i)
                        .copied()
                        .flatten()
                        .map(percent),
                })
            })
            .take(MAX_DAILY_ENTRIES)
            .collect()
    });

    UnifiedWeatherResponse {
        current,
        hourly,
        daily,
        units,
        issued_at: issued_at.unwrap_or_else(Utc::now),
        provider: ProviderKind::OpenMeteo.as_str().to_string(),
        is_stale: false,
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenMeteo
    }

    async fn fetch_weather(
        &self,
        request: &WeatherRequest,
        attempt: u32,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let (temperature_unit, wind_speed_unit) = match request.units() {
            Units::Metric => ("celsius", "kmh"),
            Units::Imperial => ("fahrenheit", "mph"),
        };

        let mut url = endpoint(&self.settings.base_url, "/v1/forecast")?;
        url.query_pairs_mut()
            .append_pair("latitude", &request.lat().to_string())
            .append_pair("longitude", &request.lon().to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("hourly", HOURLY_FIELDS)
            .append_pair("daily", DAILY_FIELDS)
            .append_pair("timezone", "GMT")
            .append_pair("forecast_days", "7")
            .append_pair("temperature_unit", temperature_unit)
            .append_pair("wind_speed_unit", wind_speed_unit);

        tracing::debug!(
            provider = "open-meteo",
            attempt,
            lat = request.lat(),
            lon = request.lon(),
            "fetching weather"
        );

        let raw: OmResponse = get_json(
            &self.client,
            ProviderKind::OpenMeteo,
            &url,
            &[],
            self.settings.timeout,
        )
        .await?;

        Ok(map_response(raw, request.units()))
    }

    async fn health_check(&self) -> ProviderHealth {
        let location = self.settings.health_location;
        match WeatherRequest::new(location.lat, location.lon, Units::Metric) {
            Ok(request) => timed_health(self.settings.health_timeout, self.fetch_weather(&request, 1)).await,
            Err(e) => ProviderHealth {
                healthy: false,
                response_time_ms: 0,
                error: Some(e.to_string()),
            },
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider_name: ProviderKind::OpenMeteo.as_str().to_string(),
            requires_api_key: false,
            supports_hourly: true,
            supports_daily: true,
            supports_alerts: false,
        }
    }
}
