//! Wire shapes exchanged with the mesh host: one JSON request in, one JSON reply out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AdapterError,
    model::{ForecastRequest, WeatherRequest, WeatherResponse},
};

/// The capability being invoked, tagged by `tool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    GetCurrentWeather(WeatherRequest),
    GetWeatherForecast(ForecastRequest),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetCurrentWeather(_) => "get_current_weather",
            ToolCall::GetWeatherForecast(_) => "get_weather_forecast",
        }
    }

    pub fn location(&self) -> &str {
        match self {
            ToolCall::GetCurrentWeather(r) => &r.location,
            ToolCall::GetWeatherForecast(r) => &r.location,
        }
    }
}

/// Inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub call: ToolCall,
}

impl AgentMessage {
    pub fn new(call: ToolCall) -> Self {
        Self {
            request_id: None,
            call,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// A payload that could not be decoded, with whatever could be salvaged from it.
#[derive(Debug)]
pub struct DecodeFailure {
    pub request_id: Option<String>,
    pub location: Option<String>,
    pub error: AdapterError,
}

/// Decode a raw JSON payload.
///
/// `request_id` and `location` are recovered from malformed messages whenever
/// the payload is at least a JSON object, so the reply can still be paired.
pub fn decode(payload: &str) -> Result<AgentMessage, DecodeFailure> {
    let value: Value = serde_json::from_str(payload).map_err(|e| DecodeFailure {
        request_id: None,
        location: None,
        error: AdapterError::InvalidRequest(format!("payload is not valid JSON: {e}")),
    })?;

    let Value::Object(mut object) = value else {
        return Err(DecodeFailure {
            request_id: None,
            location: None,
            error: AdapterError::InvalidRequest("payload must be a JSON object".to_string()),
        });
    };

    let request_id = match object.remove("request_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    let location = object
        .get("location")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match serde_json::from_value::<ToolCall>(Value::Object(object)) {
        Ok(call) => Ok(AgentMessage { request_id, call }),
        Err(e) => Err(DecodeFailure {
            request_id,
            location,
            error: AdapterError::InvalidRequest(format!("malformed message: {e}")),
        }),
    }
}

/// Outbound reply: the response plus the id of the message it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub response: WeatherResponse,
}
