use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Offset, Timelike, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{Conditions, DailyForecast, Forecast, ResolvedLocation, Units},
    provider::{ProviderId, parse_body, round1, send, status_error, unix_to_utc},
};

use super::WeatherProvider;

const NAME: &str = "openweather";

/// OpenWeatherMap 2.5 API: `/weather` for current conditions, `/forecast` for
/// 3-hour steps over five days.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: String, http: Client) -> Self {
        Self {
            api_key,
            base_url,
            http,
        }
    }

    fn units_param(units: Units) -> &'static str {
        match units {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Kelvin => "standard",
        }
    }

    async fn get(
        &self,
        path: &str,
        location: &str,
        units: Units,
        extra: &[(&str, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, location, "querying OpenWeather");

        let request = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", Self::units_param(units)),
            ])
            .query(extra);

        let (status, body) = send(NAME, request).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                provider: NAME,
                location: location.to_string(),
            });
        }
        if !status.is_success() {
            return Err(status_error(NAME, status, &body));
        }

        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    pressure: Option<f64>,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    country: Option<String>,
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    /// Probability of precipitation, 0..1.
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn describe(weather: &[OwWeather]) -> String {
    weather
        .first()
        .map(|w| title_case(&w.description))
        .unwrap_or_else(|| "Unknown".to_string())
}

pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            let Some(first) = chars.next() else {
                return String::new();
            };
            first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect()
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn into_conditions(parsed: OwCurrentResponse) -> Conditions {
    Conditions {
        location: ResolvedLocation {
            name: parsed.name,
            country: parsed.sys.country,
        },
        observed_at: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity: parsed.main.humidity,
        pressure_hpa: parsed.main.pressure,
        description: describe(&parsed.weather),
        wind_speed: parsed.wind.speed,
        wind_direction: parsed.wind.deg,
        visibility_km: parsed.visibility.map(|m| round1(m / 1000.0)),
        sunrise: parsed.sys.sunrise.and_then(unix_to_utc),
        sunset: parsed.sys.sunset.and_then(unix_to_utc),
    }
}

/// Fold 3-hour entries into per-day summaries keyed on the city's local date.
fn aggregate_forecast(parsed: OwForecastResponse, days: u8) -> Result<Forecast, ProviderError> {
    let offset = FixedOffset::east_opt(parsed.city.timezone).unwrap_or_else(|| Utc.fix());

    let first = parsed.list.first().ok_or_else(|| ProviderError::Malformed {
        provider: NAME,
        reason: "forecast response contained no data".to_string(),
    })?;
    let starts_at = unix_to_utc(first.dt).unwrap_or_else(Utc::now);

    let mut by_date: BTreeMap<NaiveDate, Vec<(u32, &OwForecastEntry)>> = BTreeMap::new();
    for entry in parsed.list.iter().take(usize::from(days) * 8) {
        let Some(utc) = unix_to_utc(entry.dt) else {
            continue;
        };
        let local = utc.with_timezone(&offset);
        by_date
            .entry(local.date_naive())
            .or_default()
            .push((local.hour(), entry));
    }

    let days = by_date
        .into_iter()
        .take(usize::from(days))
        .filter_map(|(date, entries)| {
            let (_, noon) = entries.iter().min_by_key(|(hour, _)| hour.abs_diff(12))?;
            let temps = entries.iter().map(|(_, e)| e.main.temp);

            Some(DailyForecast {
                date,
                temperature_min: temps.clone().fold(f64::INFINITY, f64::min),
                temperature_max: temps.fold(f64::NEG_INFINITY, f64::max),
                description: describe(&noon.weather),
                humidity: noon.main.humidity,
                wind_speed: noon.wind.speed,
                precipitation_probability: (noon.pop * 100.0).round(),
            })
        })
        .collect();

    let city = parsed.city;
    Ok(Forecast {
        location: ResolvedLocation {
            name: city.name,
            country: city.country,
        },
        starts_at,
        days,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn current(&self, location: &str, units: Units) -> Result<Conditions, ProviderError> {
        let body = self.get("weather", location, units, &[]).await?;
        let parsed: OwCurrentResponse = parse_body(NAME, &body)?;

        Ok(into_conditions(parsed))
    }

    async fn forecast(
        &self,
        location: &str,
        days: u8,
        units: Units,
    ) -> Result<Forecast, ProviderError> {
        // The API returns 3-hour steps and caps `cnt` at 40.
        let cnt = (u32::from(days) * 8).min(40);
        let body = self
            .get("forecast", location, units, &[("cnt", cnt.to_string())])
            .await?;
        let parsed: OwForecastResponse = parse_body(NAME, &body)?;

        aggregate_forecast(parsed, days)
    }
}
