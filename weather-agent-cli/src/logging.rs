use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use weather_agent_core::config::LoggingConfig;

/// Initialize logging for the agent.
///
/// Logs go to `{directory}/{file_name}` (plain text, no rotation) and to stderr.
/// stdout is left alone because `run` writes replies there.
///
/// The configured filter applies unless `RUST_LOG` is set:
/// - RUST_LOG=debug weather-agent run   (includes upstream URLs)
/// - RUST_LOG=warn weather-agent run    (retries, not-found, partial replies)
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("Failed to create log directory: {}", config.directory.display())
    })?;

    let file_appender = tracing_appender::rolling::never(&config.directory, &config.file_name);

    let default_filter = if verbose {
        "debug"
    } else {
        config.filter.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("Invalid log filter: {default_filter}"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        "Logging initialized to {}",
        config.directory.join(&config.file_name).display()
    );

    Ok(())
}
