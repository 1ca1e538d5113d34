use thiserror::Error;

use crate::model::ErrorKind;

/// Failure reported by a provider client for a single HTTP exchange.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("location '{location}' not found by {provider}")]
    NotFound {
        provider: &'static str,
        location: String,
    },

    /// Network failure, timeout, 5xx or rate limit. Worth retrying.
    #[error("{provider} unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} rejected the request with status {status}: {body}")]
    Rejected {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unreadable response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }
}

/// Errors surfaced by [`crate::WeatherAgent`] to its caller.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("weather provider unavailable after {attempts} attempt(s): {reason}")]
    ProviderUnavailable {
        attempts: u32,
        reason: String,
    },

    #[error("location '{0}' not found")]
    NotFound(String),
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AdapterError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            AdapterError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}
