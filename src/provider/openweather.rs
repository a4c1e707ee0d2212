//! OpenWeather One Call adapter (API key).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::http::{endpoint, get_json, timed_health};
use super::{AdapterSettings, Capabilities, ProviderHealth, ProviderKind, WeatherProvider};
use crate::error::WeatherError;
use crate::model::{
    cardinal_direction, ms_to_kmh, percent, percent_from_fraction, round_speed, round_temperature,
    Condition, CurrentConditions, DailyEntry, HourlyEntry, UnifiedWeatherResponse, Units,
    WeatherRequest, MAX_DAILY_ENTRIES, MAX_HOURLY_ENTRIES,
};
use crate::server::HttpClient;

pub struct OpenWeatherProvider {
    client: HttpClient,
    settings: AdapterSettings,
    api_key: String,
}

impl OpenWeatherProvider {
    #[must_use]
    pub const fn new(client: HttpClient, settings: AdapterSettings, api_key: String) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }
}

/// OpenWeather condition id to the shared vocabulary.
#[must_use]
pub const fn condition_from_id(id: i64) -> Condition {
    match id {
        200..=299 => Condition::Thunderstorm,
        300..=399 => Condition::Drizzle,
        520..=531 => Condition::Showers,
        500..=519 => Condition::Rain,
        600..=699 => Condition::Snow,
        700..=799 => Condition::Fog,
        800 => Condition::Clear,
        801 | 802 => Condition::PartlyCloudy,
        803 | 804 => Condition::Overcast,
        _ => Condition::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    current: OwCurrent,
    #[serde(default)]
    hourly: Vec<OwHour>,
    #[serde(default)]
    daily: Vec<OwDay>,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    dt: i64,
    temp: f64,
    feels_like: f64,
    humidity: f64,
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    #[serde(default)]
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwHour {
    dt: i64,
    temp: f64,
    #[serde(default)]
    weather: Vec<OwCondition>,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwDayTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDay {
    dt: i64,
    temp: OwDayTemp,
    #[serde(default)]
    weather: Vec<OwCondition>,
    #[serde(default)]
    pop: Option<f64>,
}

fn first_condition(weather: &[OwCondition]) -> Condition {
    weather
        .first()
        .map_or(Condition::Unknown, |w| condition_from_id(w.id))
}

fn timestamp(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn map_response(raw: OwResponse, units: Units) -> UnifiedWeatherResponse {
    let c = raw.current;
    // Metric wind arrives in m/s, imperial already in mph
    let wind_speed = match units {
        Units::Metric => ms_to_kmh(c.wind_speed),
        Units::Imperial => c.wind_speed,
    };
    let current = CurrentConditions {
        temp: round_temperature(c.temp),
        feels_like: round_temperature(c.feels_like),
        humidity: percent(c.humidity),
        wind_speed: round_speed(wind_speed),
        wind_direction: cardinal_direction(c.wind_deg).to_string(),
        condition: first_condition(&c.weather),
    };

    let hourly = raw
        .hourly
        .iter()
        .filter_map(|hour| {
            Some(HourlyEntry {
                time: timestamp(hour.dt)?,
                temp: round_temperature(hour.temp),
                condition: first_condition(&hour.weather),
                precipitation_chance: hour.pop.map(percent_from_fraction),
            })
        })
        .take(MAX_HOURLY_ENTRIES)
        .collect();

    let daily = raw
        .daily
        .iter()
        .filter_map(|day| {
            Some(DailyEntry {
                date: timestamp(day.dt)?.date_naive(),
                temp_max: round_temperature(day.temp.max),
                temp_min: round_temperature(day.temp.min),
                condition: first_condition(&day.weather),
                precipitation_chance: day.pop.map(percent_from_fraction),
            })
        })
        .take(MAX_DAILY_ENTRIES)
        .collect();

    UnifiedWeatherResponse {
        current,
        hourly,
        daily,
        units,
        issued_at: timestamp(c.dt).unwrap_or_else(Utc::now),
        provider: ProviderKind::OpenWeather.as_str().to_string(),
        is_stale: false,
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenWeather
    }

    async fn fetch_weather(
        &self,
        request: &WeatherRequest,
        attempt: u32,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let mut url = endpoint(&self.settings.base_url, "/data/3.0/onecall")?;
        url.query_pairs_mut()
            .append_pair("lat", &request.lat().to_string())
            .append_pair("lon", &request.lon().to_string())
            .append_pair("units", request.units().as_str())
            .append_pair("exclude", "minutely,alerts")
            .append_pair("appid", &self.api_key);

        tracing::debug!(
            provider = "openweather",
            attempt,
            lat = request.lat(),
            lon = request.lon(),
            "fetching weather"
        );

        let raw: OwResponse = get_json(
            &self.client,
            ProviderKind::OpenWeather,
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
            provider_name: ProviderKind::OpenWeather.as_str().to_string(),
            requires_api_key: true,
            supports_hourly: true,
            supports_daily: true,
            supports_alerts: true,
        }
    }
}
