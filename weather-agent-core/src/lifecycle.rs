use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    adapter::WeatherAgent,
    config::AgentConfig,
    message::{AgentMessage, AgentReply},
};

/// One running agent: the adapter plus host-side bookkeeping.
#[derive(Debug)]
pub struct AgentSession {
    name: String,
    agent: Arc<WeatherAgent>,
    started_at: DateTime<Utc>,
    handled: AtomicU64,
}

impl AgentSession {
    /// Validate `config`, then build the provider client and adapter from it.
    pub fn initialize(config: &AgentConfig) -> Result<Self> {
        let name = config.agent_name.clone();
        config
            .validate()
            .with_context(|| format!("Invalid configuration for agent '{name}'"))?;

        info!(agent = %name, provider = %config.provider.kind, "starting weather agent");

        let agent = WeatherAgent::from_config(config)
            .with_context(|| format!("Failed to initialize agent '{name}'"))?;
        let session = Self::with_agent(name, agent);

        info!(agent = %session.name, "{}", config.startup_message);
        Ok(session)
    }

    pub fn with_agent(name: impl Into<String>, agent: WeatherAgent) -> Self {
        Self {
            name: name.into(),
            agent: Arc::new(agent),
            started_at: Utc::now(),
            handled: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> Arc<WeatherAgent> {
        Arc::clone(&self.agent)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub async fn dispatch(&self, message: AgentMessage) -> AgentReply {
        self.handled.fetch_add(1, Ordering::Relaxed);
        self.agent.handle(message).await
    }

    pub async fn dispatch_payload(&self, payload: &str) -> AgentReply {
        self.handled.fetch_add(1, Ordering::Relaxed);
        self.agent.handle_payload(payload).await
    }

    /// Log final statistics. Dropping the session releases the HTTP client.
    pub fn shutdown(self) -> u64 {
        let handled = self.handled();
        let uptime = Utc::now() - self.started_at;

        info!(
            agent = %self.name,
            handled,
            uptime_secs = uptime.num_seconds(),
            "weather agent processed {handled} request(s) during its lifetime"
        );

        handled
    }
}
