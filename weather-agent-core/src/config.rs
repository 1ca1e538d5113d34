use anyhow::{Context, Result, anyhow, bail, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{model::Units, provider::ProviderId, retry::RetryPolicy};

/// Environment variable that overrides `provider.api_key`.
pub const API_KEY_ENV: &str = "WEATHER_AGENT_API_KEY";

/// Provider credential. Never printed in full.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Connection settings for the upstream weather API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,

    /// Overrides the provider's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderId::default(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(self.kind.default_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_name: default_log_file_name(),
            filter: default_log_filter(),
        }
    }
}

/// Top-level agent configuration.
///
/// Example TOML:
/// ```toml
/// agent_name = "weather-agent"
/// default_units = "metric"
///
/// [provider]
/// kind = "openweather"
/// api_key = "..."
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    #[serde(default = "default_startup_message")]
    pub startup_message: String,

    #[serde(default)]
    pub default_units: Units,

    /// Where `save_to_file` requests write their JSON reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            startup_message: default_startup_message(),
            default_units: Units::default(),
            artifact_dir: None,
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load, apply environment overrides and validate.
    ///
    /// With no explicit path a missing default file yields the defaults; an explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = Self::config_file_path()?;
                if path.exists() {
                    Self::read(&path)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;

        Ok(cfg)
    }

    /// Parse a file without validating it.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Replace file values with environment ones, using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.provider.api_key = Some(ApiKey::new(key.trim()));
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.agent_name.trim().is_empty(),
            "agent_name must not be empty"
        );

        let key = self.provider.api_key.as_ref().ok_or_else(|| {
            anyhow!(
                "No API key configured for provider '{}'.\n\
                 Hint: run `weather-agent configure` or set {API_KEY_ENV}.",
                self.provider.kind
            )
        })?;
        ensure!(
            !key.expose().trim().is_empty(),
            "provider.api_key must not be empty"
        );

        let base_url = self.provider.base_url();
        let parsed = reqwest::Url::parse(base_url)
            .with_context(|| format!("provider.base_url is not a valid URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "provider.base_url must use http or https, got '{}'",
                parsed.scheme()
            );
        }

        ensure!(
            self.provider.timeout_secs >= 1,
            "provider.timeout_secs must be at least 1"
        );
        ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1"
        );
        ensure!(
            self.retry.initial_backoff_ms <= self.retry.max_backoff_ms,
            "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms
        );
        ensure!(
            !self.logging.file_name.trim().is_empty(),
            "logging.file_name must not be empty"
        );

        Ok(())
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the default config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-agent", "weather-agent")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set provider and key, keeping other provider settings.
    pub fn set_provider_credentials(&mut self, kind: ProviderId, api_key: String) {
        if self.provider.kind != kind {
            self.provider.base_url = None;
        }
        self.provider.kind = kind;
        self.provider.api_key = Some(ApiKey::new(api_key));
    }
}

fn default_agent_name() -> String {
    "weather-agent".to_string()
}

fn default_startup_message() -> String {
    "Weather Agent is ready to provide weather information!".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_file_name() -> String {
    "weather-agent.log".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}
