//! Request and response types shared by every provider.
//!
//! [`WeatherRequest`] is the validated `(lat, lon, units)` triple a
//! lookup is keyed on. [`UnifiedWeatherResponse`] is the single shape
//! all providers map into. The free functions here hold the numeric
//! mapping rules (rounding, cardinal directions, unit conversion) so
//! that every provider applies them identically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    #[must_use]
    pub const fn temperature_symbol(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(WeatherError::BadRequest(format!(
                "units must be 'metric' or 'imperial', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Validated lookup parameters. Construct with [`WeatherRequest::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherRequest {
    lat: f64,
    lon: f64,
    units: Units,
}

impl WeatherRequest {
    pub fn new(lat: f64, lon: f64, units: Units) -> Result<Self, WeatherError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(WeatherError::BadRequest(format!(
                "latitude must be between -90 and 90, got {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(WeatherError::BadRequest(format!(
                "longitude must be between -180 and 180, got {lon}"
            )));
        }
        Ok(Self { lat, lon, units })
    }

    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.lon
    }

    #[must_use]
    pub const fn units(&self) -> Units {
        self.units
    }

    /// Cache key for this request against `provider`.
    ///
    /// Coordinates are rounded to two decimals (~1 km) so nearby lookups
    /// share an entry.
    #[must_use]
    pub fn cache_key(&self, provider: &str) -> String {
        format!(
            "{provider}:{}:{}:{}",
            format_coordinate(self.lat),
            format_coordinate(self.lon),
            self.units
        )
    }
}

fn format_coordinate(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid distinct keys for -0.00 and 0.00
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.2}")
}

/// Shared condition vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "partly cloudy")]
    PartlyCloudy,
    #[serde(rename = "overcast")]
    Overcast,
    #[serde(rename = "fog")]
    Fog,
    #[serde(rename = "drizzle")]
    Drizzle,
    #[serde(rename = "rain")]
    Rain,
    #[serde(rename = "snow")]
    Snow,
    #[serde(rename = "showers")]
    Showers,
    #[serde(rename = "thunderstorm")]
    Thunderstorm,
    #[serde(rename = "unknown conditions")]
    Unknown,
}

impl Condition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly cloudy",
            Self::Overcast => "overcast",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Showers => "showers",
            Self::Thunderstorm => "thunderstorm",
            Self::Unknown => "unknown conditions",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp: i32,
    pub feels_like: i32,
    pub humidity: u8,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub time: DateTime<Utc>,
    pub temp: i32,
    pub condition: Condition,
    pub precipitation_chance: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub temp_max: i32,
    pub temp_min: i32,
    pub condition: Condition,
    pub precipitation_chance: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedWeatherResponse {
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyEntry>,
    pub daily: Vec<DailyEntry>,
    pub units: Units,
    pub issued_at: DateTime<Utc>,
    pub provider: String,
    pub is_stale: bool,
}

pub const MAX_HOURLY_ENTRIES: usize = 24;
pub const MAX_DAILY_ENTRIES: usize = 7;

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_temperature(value: f64) -> i32 {
    value.round() as i32
}

/// Integer percentage in `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Percentage from a `0.0..=1.0` fraction.
#[must_use]
pub fn percent_from_fraction(value: f64) -> u8 {
    percent(value * 100.0)
}

#[must_use]
pub fn round_speed(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[must_use]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[must_use]
pub fn kmh_to_mph(kmh: f64) -> f64 {
    kmh * 0.621_371
}

#[must_use]
pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * 3.6
}

/// Compass bearing in degrees to an 8-point cardinal direction.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cardinal_direction(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    if !degrees.is_finite() {
        return "N";
    }
    let normalized = degrees.rem_euclid(360.0);
    let index = ((normalized + 22.5) / 45.0).floor() as usize % POINTS.len();
    POINTS[index]
}

/// Display form of a rounded temperature, e.g. `23°C`.
#[must_use]
pub fn format_temperature(temp: i32, units: Units) -> String {
    format!("{temp}{}", units.temperature_symbol())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(WeatherRequest::new(90.1, 0.0, Units::Metric).is_err());
        assert!(WeatherRequest::new(0.0, -180.5, Units::Metric).is_err());
        assert!(WeatherRequest::new(f64::NAN, 0.0, Units::Metric).is_err());
        assert!(WeatherRequest::new(-90.0, 180.0, Units::Imperial).is_ok());
    }

    #[test]
    fn nearby_requests_share_cache_key() {
        let a = WeatherRequest::new(32.2912, -64.7801, Units::Metric).unwrap();
        let b = WeatherRequest::new(32.2889, -64.7849, Units::Metric).unwrap();
        assert_eq!(a.cache_key("open-meteo"), "open-meteo:32.29:-64.78:metric");
        assert_eq!(a.cache_key("open-meteo"), b.cache_key("open-meteo"));
    }

    #[test]
    fn cache_key_separates_units_and_provider() {
        let metric = WeatherRequest::new(10.0, 10.0, Units::Metric).unwrap();
        let imperial = WeatherRequest::new(10.0, 10.0, Units::Imperial).unwrap();
        assert_ne!(metric.cache_key("a"), imperial.cache_key("a"));
        assert_ne!(metric.cache_key("a"), metric.cache_key("b"));
    }

    #[test]
    fn negative_zero_normalized_in_key() {
        let req = WeatherRequest::new(-0.001, 0.001, Units::Metric).unwrap();
        assert_eq!(req.cache_key("p"), "p:0.00:0.00:metric");
    }

    #[test]
    fn temperature_rounds_half_away_from_zero() {
        assert_eq!(round_temperature(22.5), 23);
        assert_eq!(round_temperature(22.4), 22);
        assert_eq!(round_temperature(-3.5), -4);
        assert_eq!(format_temperature(23, Units::Metric), "23°C");
        assert_eq!(format_temperature(73, Units::Imperial), "73°F");
    }

    #[test]
    fn cardinal_directions() {
        assert_eq!(cardinal_direction(0.0), "N");
        assert_eq!(cardinal_direction(22.4), "N");
        assert_eq!(cardinal_direction(22.5), "NE");
        assert_eq!(cardinal_direction(90.0), "E");
        assert_eq!(cardinal_direction(180.0), "S");
        assert_eq!(cardinal_direction(270.0), "W");
        assert_eq!(cardinal_direction(350.0), "N");
        assert_eq!(cardinal_direction(360.0), "N");
        assert_eq!(cardinal_direction(-45.0), "NW");
    }

    #[test]
    fn percentages_clamp() {
        assert_eq!(percent(65.0), 65);
        assert_eq!(percent(104.0), 100);
        assert_eq!(percent(-2.0), 0);
        assert_eq!(percent_from_fraction(0.654), 65);
    }

    #[test]
    fn units_parse_case_insensitive() {
        assert_eq!("Imperial".parse::<Units>().unwrap(), Units::Imperial);
        let err = "kelvin".parse::<Units>().unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn condition_serializes_to_vocabulary() {
        let json = serde_json::to_string(&Condition::PartlyCloudy).unwrap();
        assert_eq!(json, "\"partly cloudy\"");
        let json = serde_json::to_string(&Condition::Unknown).unwrap();
        assert_eq!(json, "\"unknown conditions\"");
    }
}
