use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use weather_agent_core::{AgentConfig, ProviderId, Units};

/// Interactively set provider, credentials and defaults, then save to `path`.
pub fn run(path: &Path) -> Result<()> {
    let mut cfg = if path.exists() {
        AgentConfig::read(path)?
    } else {
        AgentConfig::default()
    };

    let providers = ProviderId::all().to_vec();
    let current = providers
        .iter()
        .position(|p| *p == cfg.provider.kind)
        .unwrap_or(0);
    let provider = Select::new("Weather provider:", providers)
        .with_starting_cursor(current)
        .prompt()
        .context("Provider selection aborted")?;

    let api_key = Password::new(&format!("API key for {provider}:"))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message("Stored in the config file; WEATHER_AGENT_API_KEY overrides it")
        .prompt()
        .context("API key entry aborted")?;
    cfg.set_provider_credentials(provider, api_key.trim().to_string());

    let units = Units::all().to_vec();
    let current = units
        .iter()
        .position(|u| *u == cfg.default_units)
        .unwrap_or(0);
    cfg.default_units = Select::new("Default units:", units)
        .with_starting_cursor(current)
        .prompt()
        .context("Units selection aborted")?;

    let existing = cfg
        .artifact_dir
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let artifact_dir = Text::new("Directory for saved reports (empty disables saving):")
        .with_default(&existing)
        .prompt()
        .context("Artifact directory entry aborted")?;
    cfg.artifact_dir = parse_artifact_dir(&artifact_dir);

    cfg.validate()?;
    cfg.save(path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn parse_artifact_dir(input: &str) -> Option<PathBuf> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}
