use std::{convert::TryFrom, fmt::Debug, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::ProviderConfig,
    error::ProviderError,
    model::{Conditions, Forecast, Units},
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "https://api.openweathermap.org/data/2.5",
            ProviderId::WeatherApi => "https://api.weatherapi.com/v1",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Upstream weather data source.
///
/// Implementations make exactly one HTTP exchange per call; retrying is the
/// caller's business.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn current(&self, location: &str, units: Units) -> Result<Conditions, ProviderError>;

    async fn forecast(
        &self,
        location: &str,
        days: u8,
        units: Units,
    ) -> Result<Forecast, ProviderError>;
}

/// Construct the configured provider. Fails if no API key is set.
pub fn provider_from_config(config: &ProviderConfig) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.kind;
    let api_key = config.api_key.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather-agent configure` and enter your API key."
        )
    })?;

    let http = http_client(config.timeout())?;
    let base_url = config.base_url().trim_end_matches('/').to_string();
    let api_key = api_key.expose().to_owned();

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(api_key, base_url, http)),
        ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(api_key, base_url, http)),
    };

    Ok(boxed)
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("weather-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Send a request and return the status plus the raw body.
pub(crate) async fn send(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<(StatusCode, String), ProviderError> {
    let res = request
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;
    let status = res.status();
    let body = res.text().await.map_err(|e| transport_error(provider, &e))?;

    Ok((status, body))
}

/// Classify a non-success status that is not a provider-specific "not found".
pub(crate) fn status_error(
    provider: &'static str,
    status: StatusCode,
    body: &str,
) -> ProviderError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Unavailable {
            provider,
            reason: format!("status {}: {}", status, truncate_body(body)),
        }
    } else {
        ProviderError::Rejected {
            provider,
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        provider,
        reason: e.to_string(),
    })
}

fn transport_error(provider: &'static str, err: &reqwest::Error) -> ProviderError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };

    ProviderError::Unavailable { provider, reason }
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

/// Round to one decimal place, as providers report.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, ApiKey};

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = AgentConfig::default();
        let err = provider_from_config(&cfg.provider).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_builds_selected_kind() {
        let mut cfg = AgentConfig::default();
        cfg.provider.api_key = Some(ApiKey::new("KEY"));

        for id in ProviderId::all() {
            cfg.provider.kind = *id;
            let provider = provider_from_config(&cfg.provider).expect("provider should build");
            assert_eq!(provider.id(), *id);
        }
    }

    #[test]
    fn status_error_classifies_transient_statuses() {
        let bad_gateway = status_error("p", StatusCode::BAD_GATEWAY, "");
        let throttled = status_error("p", StatusCode::TOO_MANY_REQUESTS, "");
        let unauthorized = status_error("p", StatusCode::UNAUTHORIZED, "bad key");

        assert!(bad_gateway.is_transient());
        assert!(throttled.is_transient());
        assert!(!unauthorized.is_transient());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
