//! Shared fixtures for adapter tests.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use weather_agent_core::{
    ProviderError, ProviderId, RetryPolicy, Units, WeatherAgent, WeatherProvider,
    model::{Conditions, DailyForecast, Forecast, ResolvedLocation},
};

/// How the scripted provider answers.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    Fixed,
    NotFound,
    Unavailable,
    Rejected,
    /// Transient failures for the first `n` calls, then success.
    FailFirst(u32),
}

/// Deterministic in-memory provider that counts its calls.
#[derive(Debug)]
pub struct ScriptedProvider {
    mode: Mode,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome(&self, location: &str) -> Result<(), ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        match self.mode {
            Mode::Fixed => Ok(()),
            Mode::FailFirst(n) if call > n => Ok(()),
            Mode::NotFound => Err(ProviderError::NotFound {
                provider: "scripted",
                location: location.to_string(),
            }),
            Mode::Unavailable | Mode::FailFirst(_) => Err(ProviderError::Unavailable {
                provider: "scripted",
                reason: "request timed out".into(),
            }),
            Mode::Rejected => Err(ProviderError::Rejected {
                provider: "scripted",
                status: 401,
                body: "Invalid API key".into(),
            }),
        }
    }
}

pub fn observed_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_875_200, 0).unwrap()
}

fn resolve(location: &str) -> ResolvedLocation {
    ResolvedLocation {
        name: location.trim().to_string(),
        country: Some("FR".into()),
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn current(&self, location: &str, units: Units) -> Result<Conditions, ProviderError> {
        self.outcome(location)?;

        let temperature = match units {
            Units::Metric => 18.0,
            Units::Imperial => 64.4,
            Units::Kelvin => 291.15,
        };

        Ok(Conditions {
            location: resolve(location),
            observed_at: observed_at(),
            temperature,
            feels_like: temperature,
            humidity: 60,
            pressure_hpa: Some(1015.0),
            description: "Clear Sky".into(),
            wind_speed: 3.6,
            wind_direction: Some(250),
            visibility_km: Some(10.0),
            sunrise: None,
            sunset: None,
        })
    }

    async fn forecast(
        &self,
        location: &str,
        days: u8,
        _units: Units,
    ) -> Result<Forecast, ProviderError> {
        self.outcome(location)?;

        let start = NaiveDate::from_ymd_opt(2025, 10, 19).unwrap();
        let days = (0..u64::from(days))
            .map(|i| DailyForecast {
                date: start + chrono::Days::new(i),
                temperature_min: 10.0,
                temperature_max: 18.0 + i as f64,
                description: "Few Clouds".into(),
                humidity: 65,
                wind_speed: 4.0,
                precipitation_probability: if i == 0 { 30.0 } else { 0.0 },
            })
            .collect();

        Ok(Forecast {
            location: resolve(location),
            starts_at: observed_at(),
            days,
        })
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
}

pub fn agent(mode: Mode, max_attempts: u32) -> (WeatherAgent, Arc<ScriptedProvider>) {
    let provider = ScriptedProvider::new(mode);
    let agent = WeatherAgent::new(provider.clone(), fast_retry(max_attempts));
    (agent, provider)
}
