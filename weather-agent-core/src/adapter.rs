use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use anyhow::Result;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    artifact::{self, ArtifactStore},
    config::AgentConfig,
    error::{AdapterError, ProviderError},
    message::{self, AgentMessage, AgentReply, ToolCall},
    model::{
        ArtifactInfo, CURRENT_FIELDS, ErrorInfo, ForecastRequest, MAX_FORECAST_DAYS, Status,
        Units, WeatherRequest, WeatherResponse,
    },
    provider::{WeatherProvider, provider_from_config},
    retry::{RetryFailure, RetryPolicy},
    summary,
};

const MAX_LOCATION_CHARS: usize = 256;

/// Maps mesh requests onto a weather provider and back.
///
/// Holds no per-request state; share it behind an `Arc` and call it concurrently.
#[derive(Debug, Clone)]
pub struct WeatherAgent {
    provider: Arc<dyn WeatherProvider>,
    retry: RetryPolicy,
    default_units: Units,
    artifacts: Option<ArtifactStore>,
}

impl WeatherAgent {
    pub fn new(provider: Arc<dyn WeatherProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            default_units: Units::default(),
            artifacts: None,
        }
    }

    pub fn with_default_units(mut self, units: Units) -> Self {
        self.default_units = units;
        self
    }

    pub fn with_artifact_store(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// Build the provider client and adapter described by `config`.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let provider: Arc<dyn WeatherProvider> = provider_from_config(&config.provider)?.into();

        let mut agent =
            Self::new(provider, config.retry.policy()).with_default_units(config.default_units);
        if let Some(dir) = &config.artifact_dir {
            agent = agent.with_artifact_store(ArtifactStore::new(dir));
        }

        Ok(agent)
    }

    pub fn provider(&self) -> &dyn WeatherProvider {
        self.provider.as_ref()
    }

    /// Current conditions for one location.
    ///
    /// An unknown location is not an `Err`: it comes back as a reply with
    /// `status = error`.
    pub async fn current_weather(
        &self,
        request: &WeatherRequest,
    ) -> Result<WeatherResponse, AdapterError> {
        let location = validate_location(&request.location)?;
        let units = request.units.unwrap_or(self.default_units);
        let requested = request.requested_fields();

        info!(
            location,
            %units,
            provider = %self.provider.id(),
            "current weather requested"
        );

        let outcome = self
            .retry
            .run(move || self.provider.current(location, units))
            .await;
        let conditions = match outcome {
            Ok(c) => c,
            Err(failure) => return self.failure_reply(location, units, failure),
        };

        let resolved = conditions.location.to_string();
        let available = conditions.field_values();

        let (fields, missing_fields) = if requested.is_empty() {
            let all = available
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            (all, Vec::new())
        } else {
            project_fields(&requested, available)
        };

        let status = if missing_fields.is_empty() {
            Status::Ok
        } else {
            Status::Partial
        };
        if status == Status::Partial {
            warn!(
                location,
                missing = ?missing_fields,
                "some requested fields are unavailable"
            );
        }

        let mut response = WeatherResponse {
            summary: Some(summary::current_summary(&resolved, units, &fields)),
            location: resolved,
            units,
            fields,
            forecast: None,
            missing_fields,
            observed_at: conditions.observed_at,
            status,
            error: None,
            artifact: None,
        };

        if request.save_to_file {
            let base = format!("current_weather_{location}");
            response.artifact = Some(self.save(&base, &response).await);
        }

        info!(
            location,
            resolved = %response.location,
            status = ?response.status,
            "current weather served"
        );
        Ok(response)
    }

    /// Daily forecast for one location, `1..=5` days ahead.
    pub async fn forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<WeatherResponse, AdapterError> {
        let location = validate_location(&request.location)?;
        if !(1..=MAX_FORECAST_DAYS).contains(&request.days) {
            return Err(AdapterError::InvalidRequest(format!(
                "days must be between 1 and {MAX_FORECAST_DAYS}, got {}",
                request.days
            )));
        }
        let units = request.units.unwrap_or(self.default_units);
        let days = request.days;

        info!(location, days, %units, provider = %self.provider.id(), "forecast requested");

        let outcome = self
            .retry
            .run(move || self.provider.forecast(location, days, units))
            .await;
        let forecast = match outcome {
            Ok(f) => f,
            Err(failure) => return self.failure_reply(location, units, failure),
        };

        let resolved = forecast.location.to_string();
        let status = if forecast.days.len() < usize::from(days) {
            Status::Partial
        } else {
            Status::Ok
        };

        let mut response = WeatherResponse {
            summary: Some(summary::forecast_summary(&resolved, units, &forecast.days)),
            location: resolved,
            units,
            fields: BTreeMap::from([("days".to_string(), Value::from(forecast.days.len()))]),
            forecast: Some(forecast.days),
            missing_fields: Vec::new(),
            observed_at: forecast.starts_at,
            status,
            error: None,
            artifact: None,
        };

        if request.save_to_file {
            let base = format!("forecast_{location}_{days}day");
            response.artifact = Some(self.save(&base, &response).await);
        }

        info!(
            location,
            resolved = %response.location,
            status = ?response.status,
            "forecast served"
        );
        Ok(response)
    }

    /// Boundary entry point: every outcome, including errors, becomes a reply.
    pub async fn handle(&self, message: AgentMessage) -> AgentReply {
        let AgentMessage { request_id, call } = message;

        let result = match &call {
            ToolCall::GetCurrentWeather(req) => self.current_weather(req).await,
            ToolCall::GetWeatherForecast(req) => self.forecast(req).await,
        };

        let response = result.unwrap_or_else(|err| {
            let units = match &call {
                ToolCall::GetCurrentWeather(r) => r.units,
                ToolCall::GetWeatherForecast(r) => r.units,
            };
            error_response(call.location(), units.unwrap_or(self.default_units), &err)
        });

        AgentReply {
            request_id,
            response,
        }
    }

    /// Decode a raw JSON payload and handle it. Undecodable payloads get an
    /// `invalid_request` reply.
    pub async fn handle_payload(&self, payload: &str) -> AgentReply {
        match message::decode(payload) {
            Ok(message) => self.handle(message).await,
            Err(failure) => {
                warn!(request_id = ?failure.request_id, "rejected payload: {}", failure.error);
                let location = failure.location.as_deref().unwrap_or_default();
                AgentReply {
                    request_id: failure.request_id,
                    response: error_response(location, self.default_units, &failure.error),
                }
            }
        }
    }

    fn failure_reply(
        &self,
        location: &str,
        units: Units,
        failure: RetryFailure,
    ) -> Result<WeatherResponse, AdapterError> {
        let RetryFailure { attempts, last } = failure;

        match last {
            ProviderError::NotFound { .. } => {
                warn!(location, "location not found by provider");
                let err = AdapterError::NotFound(location.to_string());
                Ok(error_response(location, units, &err))
            }
            other => {
                error!(location, attempts, "weather provider failed: {other}");
                Err(AdapterError::ProviderUnavailable {
                    attempts,
                    reason: other.to_string(),
                })
            }
        }
    }

    async fn save(&self, base: &str, response: &WeatherResponse) -> ArtifactInfo {
        match &self.artifacts {
            Some(store) => store.save(base, response).await,
            None => artifact::not_configured(),
        }
    }
}

fn error_response(location: &str, units: Units, err: &AdapterError) -> WeatherResponse {
    WeatherResponse::failure(
        location.trim(),
        units,
        ErrorInfo {
            kind: err.kind(),
            message: err.to_string(),
        },
    )
}

/// Trimmed location, or `InvalidRequest`.
pub fn validate_location(raw: &str) -> Result<&str, AdapterError> {
    let location = raw.trim();

    if location.is_empty() {
        return Err(AdapterError::InvalidRequest(
            "location must not be empty".to_string(),
        ));
    }
    if location.chars().count() > MAX_LOCATION_CHARS {
        return Err(AdapterError::InvalidRequest(format!(
            "location must be at most {MAX_LOCATION_CHARS} characters"
        )));
    }
    if location.chars().any(char::is_control) {
        return Err(AdapterError::InvalidRequest(
            "location must not contain control characters".to_string(),
        ));
    }

    Ok(location)
}

/// Keep the requested fields that are available; report the rest as missing,
/// in catalogue order with unknown names last.
fn project_fields(
    requested: &BTreeSet<String>,
    mut available: BTreeMap<&'static str, Value>,
) -> (BTreeMap<String, Value>, Vec<String>) {
    let mut fields = BTreeMap::new();
    let mut missing = Vec::new();

    let unknown = requested
        .iter()
        .filter(|f| !CURRENT_FIELDS.contains(&f.as_str()))
        .cloned();
    let ordered = CURRENT_FIELDS
        .iter()
        .filter(|f| requested.contains(**f))
        .map(|f| f.to_string())
        .chain(unknown);

    for name in ordered {
        match available.remove(name.as_str()) {
            Some(value) => {
                fields.insert(name, value);
            }
            None => missing.push(name),
        }
    }

    (fields, missing)
}
