//! Apple WeatherKit adapter (certificate-authenticated).
//!
//! Every request carries a freshly signed ES256 bearer token from
//! [`RequestSigner`]. WeatherKit always answers in metric with humidity
//! and precipitation as fractions, so imperial requests are converted
//! here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::http::{endpoint, get_json, timed_health};
use super::signer::RequestSigner;
use super::{AdapterSettings, Capabilities, ProviderHealth, ProviderKind, WeatherProvider};
use crate::error::WeatherError;
use crate::model::{
    cardinal_direction, celsius_to_fahrenheit, kmh_to_mph, percent_from_fraction, round_speed,
    round_temperature, Condition, CurrentConditions, DailyEntry, HourlyEntry,
    UnifiedWeatherResponse, Units, WeatherRequest, MAX_DAILY_ENTRIES, MAX_HOURLY_ENTRIES,
};
use crate::server::HttpClient;

const DATA_SETS: &str = "currentWeather,forecastHourly,forecastDaily";

pub struct WeatherKitProvider {
    client: HttpClient,
    settings: AdapterSettings,
    signer: RequestSigner,
}

impl WeatherKitProvider {
    #[must_use]
    pub const fn new(client: HttpClient, settings: AdapterSettings, signer: RequestSigner) -> Self {
        Self {
            client,
            settings,
            signer,
        }
    }
}

/// WeatherKit `conditionCode` to the shared vocabulary.
#[must_use]
pub fn condition_from_code(code: &str) -> Condition {
    match code {
        "Clear" | "MostlyClear" | "Hot" => Condition::Clear,
        "PartlyCloudy" | "MostlyCloudy" => Condition::PartlyCloudy,
        "Cloudy" => Condition::Overcast,
        "Foggy" | "Haze" | "Smoky" => Condition::Fog,
        "Drizzle" | "FreezingDrizzle" => Condition::Drizzle,
        "Rain" | "HeavyRain" | "FreezingRain" | "Hail" => Condition::Rain,
        "Snow" | "HeavySnow" | "Flurries" | "SunFlurries" | "Blizzard" | "BlowingSnow"
        | "Sleet" | "WintryMix" | "Frigid" => Condition::Snow,
        "SunShowers" | "ScatteredShowers" => Condition::Showers,
        "Thunderstorms" | "IsolatedThunderstorms" | "ScatteredThunderstorms" | "StrongStorms" => {
            Condition::Thunderstorm
        }
        _ => Condition::Unknown,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WkResponse {
    current_weather: WkCurrent,
    #[serde(default)]
    forecast_hourly: Option<WkHourly>,
    #[serde(default)]
    forecast_daily: Option<WkDaily>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WkCurrent {
    as_of: DateTime<Utc>,
    temperature: f64,
    temperature_apparent: f64,
    humidity: f64,
    wind_speed: f64,
    #[serde(default)]
    wind_direction: f64,
    condition_code: String,
}

#[derive(Debug, Deserialize)]
struct WkHourly {
    hours: Vec<WkHour>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WkHour {
    forecast_start: DateTime<Utc>,
    temperature: f64,
    condition_code: String,
    #[serde(default)]
    precipitation_chance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WkDaily {
    days: Vec<WkDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WkDay {
    forecast_start: DateTime<Utc>,
    temperature_max: f64,
    temperature_min: f64,
    condition_code: String,
    #[serde(default)]
    precipitation_chance: Option<f64>,
}

fn temperature(celsius: f64, units: Units) -> i32 {
    match units {
        Units::Metric => round_temperature(celsius),
        Units::Imperial => round_temperature(celsius_to_fahrenheit(celsius)),
    }
}

fn speed(kmh: f64, units: Units) -> f64 {
    match units {
        Units::Metric => round_speed(kmh),
        Units::Imperial => round_speed(kmh_to_mph(kmh)),
    }
}

fn map_response(raw: WkResponse, units: Units) -> UnifiedWeatherResponse {
    let c = raw.current_weather;
    let current = CurrentConditions {
        temp: temperature(c.temperature, units),
        feels_like: temperature(c.temperature_apparent, units),
        humidity: percent_from_fraction(c.humidity),
        wind_speed: speed(c.wind_speed, units),
        wind_direction: cardinal_direction(c.wind_direction).to_string(),
        condition: condition_from_code(&c.condition_code),
    };

    let hourly = raw.forecast_hourly.map_or_else(Vec::new, |h| {
        h.hours
            .into_iter()
            .take(MAX_HOURLY_ENTRIES)
            .map(|hour| HourlyEntry {
                time: hour.forecast_start,
                temp: temperature(hour.temperature, units),
                condition: condition_from_code(&hour.condition_code),
                precipitation_chance: hour.precipitation_chance.map(percent_from_fraction),
            })
            .collect()
    });

    let daily = raw.forecast_daily.map_or_else(Vec::new, |d| {
        d.days
            .into_iter()
            .take(MAX_DAILY_ENTRIES)
            .map(|day| DailyEntry {
                date: day.forecast_start.date_naive(),
                temp_max: temperature(day.temperature_max, units),
                temp_min: temperature(day.temperature_min, units),
                condition: condition_from_code(&day.condition_code),
                precipitation_chance: day.precipitation_chance.map(percent_from_fraction),
            })
            .collect()
    });

    UnifiedWeatherResponse {
        current,
        hourly,
        daily,
        units,
        issued_at: c.as_of,
        provider: ProviderKind::WeatherKit.as_str().to_string(),
        is_stale: false,
    }
}

#[async_trait]
impl WeatherProvider for WeatherKitProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WeatherKit
    }

    async fn fetch_weather(
        &self,
        request: &WeatherRequest,
        attempt: u32,
    ) -> Result<UnifiedWeatherResponse, WeatherError> {
        let path = format!("/api/v1/weather/en/{}/{}", request.lat(), request.lon());
        let mut url = endpoint(&self.settings.base_url, &path)?;
        url.query_pairs_mut()
            .append_pair("dataSets", DATA_SETS)
            .append_pair("timezone", "UTC");

        // Tokens are minted per request; signing is cheap next to the round trip
        let token = self.signer.sign(Utc::now()).map_err(|e| {
            tracing::error!(provider = "weatherkit", error = %e, "token signing failed");
            WeatherError::BadRequest(format!("weatherkit token signing failed: {e}"))
        })?;

        tracing::debug!(
            provider = "weatherkit",
            attempt,
            lat = request.lat(),
            lon = request.lon(),
            "fetching weather"
        );

        let raw: WkResponse = get_json(
            &self.client,
            ProviderKind::WeatherKit,
            &url,
            &[("authorization", format!("Bearer {token}"))],
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
            provider_name: ProviderKind::WeatherKit.as_str().to_string(),
            requires_api_key: true,
            supports_hourly: true,
            supports_daily: true,
            supports_alerts: true,
        }
    }
}
