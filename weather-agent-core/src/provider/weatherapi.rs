use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{Conditions, DailyForecast, Forecast, ResolvedLocation, Units},
    provider::{ProviderId, parse_body, round1, send, status_error, unix_to_utc},
};

use super::WeatherProvider;

const NAME: &str = "weatherapi";

/// WeatherAPI.com error code for "No matching location found".
const NO_LOCATION_FOUND: u32 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: String, http: Client) -> Self {
        Self {
            api_key,
            base_url,
            http,
        }
    }

    async fn get(
        &self,
        path: &str,
        location: &str,
        extra: &[(&str, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, location, "querying WeatherAPI");

        let request = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location)])
            .query(extra);

        let (status, body) = send(NAME, request).await?;

        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::BAD_REQUEST && error_code(&body) == Some(NO_LOCATION_FOUND) {
            return Err(ProviderError::NotFound {
                provider: NAME,
                location: location.to_string(),
            });
        }

        Err(status_error(NAME, status, &body))
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    error: WaError,
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: u32,
}

fn error_code(body: &str) -> Option<u32> {
    serde_json::from_str::<WaErrorBody>(body)
        .ok()
        .map(|b| b.error.code)
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
    localtime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    humidity: u8,
    pressure_mb: Option<f64>,
    wind_kph: f64,
    wind_mph: f64,
    wind_degree: Option<u16>,
    vis_km: Option<f64>,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    maxtemp_f: f64,
    mintemp_c: f64,
    mintemp_f: f64,
    avghumidity: f64,
    maxwind_kph: f64,
    maxwind_mph: f64,
    #[serde(default)]
    daily_chance_of_rain: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    date_epoch: Option<i64>,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    forecast: WaForecast,
}

/// WeatherAPI reports both scales; pick one, deriving kelvin from celsius.
fn temperature(celsius: f64, fahrenheit: f64, units: Units) -> f64 {
    match units {
        Units::Metric => celsius,
        Units::Imperial => fahrenheit,
        Units::Kelvin => ((celsius + 273.15) * 100.0).round() / 100.0,
    }
}

fn wind_speed(kph: f64, mph: f64, units: Units) -> f64 {
    match units {
        Units::Imperial => mph,
        Units::Metric | Units::Kelvin => round1(kph / 3.6),
    }
}

impl From<WaLocation> for ResolvedLocation {
    fn from(location: WaLocation) -> Self {
        ResolvedLocation {
            name: location.name,
            country: Some(location.country),
        }
    }
}

fn into_conditions(parsed: WaResponse, units: Units) -> Conditions {
    let current = parsed.current;
    let ts = current
        .last_updated_epoch
        .or(parsed.location.localtime_epoch);

    Conditions {
        location: parsed.location.into(),
        observed_at: ts.and_then(unix_to_utc).unwrap_or_else(Utc::now),
        temperature: temperature(current.temp_c, current.temp_f, units),
        feels_like: temperature(current.feelslike_c, current.feelslike_f, units),
        humidity: current.humidity,
        pressure_hpa: current.pressure_mb,
        description: current.condition.text,
        wind_speed: wind_speed(current.wind_kph, current.wind_mph, units),
        wind_direction: current.wind_degree,
        visibility_km: current.vis_km,
        sunrise: None,
        sunset: None,
    }
}

fn into_forecast(
    parsed: WaForecastResponse,
    days: u8,
    units: Units,
) -> Result<Forecast, ProviderError> {
    let Some(first) = parsed.forecast.forecastday.first() else {
        return Err(ProviderError::Malformed {
            provider: NAME,
            reason: "response contained no forecastday data".to_string(),
        });
    };
    let starts_at = first
        .date_epoch
        .and_then(unix_to_utc)
        .unwrap_or_else(Utc::now);

    let days = parsed
        .forecast
        .forecastday
        .into_iter()
        .take(usize::from(days))
        .map(|fd| DailyForecast {
            date: fd.date,
            temperature_min: temperature(fd.day.mintemp_c, fd.day.mintemp_f, units),
            temperature_max: temperature(fd.day.maxtemp_c, fd.day.maxtemp_f, units),
            description: fd.day.condition.text,
            humidity: fd.day.avghumidity.round().clamp(0.0, 100.0) as u8,
            wind_speed: wind_speed(fd.day.maxwind_kph, fd.day.maxwind_mph, units),
            precipitation_probability: fd.day.daily_chance_of_rain,
        })
        .collect();

    Ok(Forecast {
        location: parsed.location.into(),
        starts_at,
        days,
    })
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn current(&self, location: &str, units: Units) -> Result<Conditions, ProviderError> {
        let body = self.get("current.json", location, &[]).await?;
        let parsed: WaResponse = parse_body(NAME, &body)?;

        Ok(into_conditions(parsed, units))
    }

    async fn forecast(
        &self,
        location: &str,
        days: u8,
        units: Units,
    ) -> Result<Forecast, ProviderError> {
        let body = self
            .get("forecast.json", location, &[("days", days.to_string())])
            .await?;
        let parsed: WaForecastResponse = parse_body(NAME, &body)?;

        into_forecast(parsed, days, units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = r#"{
        "location": {"name": "London", "country": "United Kingdom", "localtime_epoch": 1760875200},
        "current": {
            "last_updated_epoch": 1760874300,
            "temp_c": 12.0, "temp_f": 53.6,
            "feelslike_c": 10.5, "feelslike_f": 50.9,
            "humidity": 82, "pressure_mb": 1012.0,
            "wind_kph": 18.0, "wind_mph": 11.2, "wind_degree": 240,
            "vis_km": 10.0,
            "condition": {"text": "Light rain"}
        }
    }"#;

    const FORECAST: &str = r#"{
        "location": {"name": "London", "country": "United Kingdom"},
        "forecast": {"forecastday": [
            {"date": "2025-10-19", "date_epoch": 1760832000, "day": {
                "maxtemp_c": 14.0, "maxtemp_f": 57.2, "mintemp_c": 8.0, "mintemp_f": 46.4,
                "avghumidity": 77.4, "maxwind_kph": 21.6, "maxwind_mph": 13.4,
                "daily_chance_of_rain": 85, "condition": {"text": "Patchy rain nearby"}}},
            {"date": "2025-10-20", "date_epoch": 1760918400, "day": {
                "maxtemp_c": 15.0, "maxtemp_f": 59.0, "mintemp_c": 9.0, "mintemp_f": 48.2,
                "avghumidity": 70, "maxwind_kph": 10.8, "maxwind_mph": 6.7,
                "daily_chance_of_rain": 0, "condition": {"text": "Sunny"}}}
        ]}
    }"#;

    fn current(units: Units) -> Conditions {
        into_conditions(serde_json::from_str(CURRENT).unwrap(), units)
    }

    #[test]
    fn maps_current_in_each_unit_system() {
        let metric = current(Units::Metric);
        assert_eq!(metric.location.to_string(), "London, United Kingdom");
        assert_eq!(metric.temperature, 12.0);
        assert_eq!(metric.wind_speed, 5.0);
        assert_eq!(metric.observed_at.timestamp(), 1760874300);
        assert_eq!(metric.sunrise, None);

        let imperial = current(Units::Imperial);
        assert_eq!(imperial.temperature, 53.6);
        assert_eq!(imperial.wind_speed, 11.2);

        let kelvin = current(Units::Kelvin);
        assert_eq!(kelvin.temperature, 285.15);
        assert_eq!(kelvin.wind_speed, 5.0);
    }

    #[test]
    fn maps_forecast_days() {
        let parsed = serde_json::from_str(FORECAST).unwrap();
        let forecast = into_forecast(parsed, 1, Units::Metric).unwrap();

        assert_eq!(forecast.days.len(), 1);
        let day = &forecast.days[0];
        assert_eq!(day.temperature_min, 8.0);
        assert_eq!(day.temperature_max, 14.0);
        assert_eq!(day.humidity, 77);
        assert_eq!(day.wind_speed, 6.0);
        assert_eq!(day.precipitation_probability, 85.0);
        assert_eq!(forecast.starts_at.timestamp(), 1760832000);
    }

    #[test]
    fn recognizes_location_not_found_body() {
        let body = r#"{"error": {"code": 1006, "message": "No matching location found."}}"#;
        assert_eq!(error_code(body), Some(NO_LOCATION_FOUND));
        assert_eq!(error_code("<html>"), None);
    }
}
