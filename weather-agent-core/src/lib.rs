//! Core library for the weather mesh agent.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers, with bounded retries
//! - The request/response adapter and its wire messages
//! - Shared domain models (requests, responses)
//!
//! It is used by `weather-agent`, but can also be embedded by any host that
//! delivers JSON messages.

pub mod adapter;
pub mod artifact;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod model;
pub mod provider;
pub mod retry;
pub mod summary;

pub use adapter::WeatherAgent;
pub use config::{AgentConfig, ProviderConfig};
pub use error::{AdapterError, ProviderError};
pub use lifecycle::AgentSession;
pub use message::{AgentMessage, AgentReply, ToolCall};
pub use model::{ForecastRequest, Status, Units, WeatherRequest, WeatherResponse};
pub use provider::{ProviderId, WeatherProvider};
pub use retry::RetryPolicy;
