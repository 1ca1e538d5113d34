use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use weather_agent_core::{
    AgentConfig, AgentMessage, AgentSession, ForecastRequest, Status, ToolCall, Units,
    WeatherRequest, WeatherResponse,
};

use crate::{configure, logging, serve};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-agent", version, about = "Weather mesh agent")]
pub struct Cli {
    /// Config file; defaults to config.toml in the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve JSON requests from stdin, one per line; replies go to stdout.
    Run,

    /// Show current conditions for a location.
    Current {
        /// City name, "City, CC", coordinates or postal code.
        location: String,

        /// metric, imperial or kelvin; defaults to the configured units.
        #[arg(long)]
        units: Option<Units>,

        /// Only return this field; repeat for several.
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Print the raw JSON reply.
        #[arg(long)]
        json: bool,

        /// Save the reply as a report in the artifact directory.
        #[arg(long)]
        save: bool,
    },

    /// Show a daily forecast for a location.
    Forecast {
        location: String,

        /// Number of days, 1 to 5.
        #[arg(long, default_value_t = 5)]
        days: u8,

        #[arg(long)]
        units: Option<Units>,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        save: bool,
    },

    /// Configure provider credentials interactively.
    Configure,

    /// Show the config file location and the effective settings.
    Config,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            verbose,
            command,
        } = self;
        let config = config.as_deref();

        match command {
            Command::Configure => configure::run(&config_path(config)?),
            Command::Config => {
                let cfg = AgentConfig::load(config)?;
                println!("Config file: {}", config_path(config)?.display());
                println!("{cfg:#?}");
                Ok(())
            }
            Command::Run => {
                let session = Arc::new(start(config, verbose)?);

                serve::serve(
                    Arc::clone(&session),
                    tokio::io::BufReader::new(tokio::io::stdin()),
                    tokio::io::stdout(),
                )
                .await?;

                let session = Arc::try_unwrap(session)
                    .map_err(|_| anyhow!("agent session is still shared after shutdown"))?;
                session.shutdown();
                Ok(())
            }
            Command::Current {
                location,
                units,
                fields,
                json,
                save,
            } => {
                let mut request = WeatherRequest::new(location);
                request.units = units;
                if !fields.is_empty() {
                    request = request.with_fields(fields);
                }
                request.save_to_file = save;

                one_shot(config, verbose, ToolCall::GetCurrentWeather(request), json).await
            }
            Command::Forecast {
                location,
                days,
                units,
                json,
                save,
            } => {
                let mut request = ForecastRequest::new(location, days);
                request.units = units;
                request.save_to_file = save;

                one_shot(config, verbose, ToolCall::GetWeatherForecast(request), json).await
            }
        }
    }
}

fn config_path(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => AgentConfig::config_file_path(),
    }
}

fn start(config: Option<&Path>, verbose: bool) -> Result<AgentSession> {
    let cfg = AgentConfig::load(config)?;
    logging::init(&cfg.logging, verbose)?;
    AgentSession::initialize(&cfg)
}

async fn one_shot(config: Option<&Path>, verbose: bool, call: ToolCall, json: bool) -> Result<()> {
    let session = start(config, verbose)?;
    let reply = session.dispatch(AgentMessage::new(call)).await;
    session.shutdown();

    let response = reply.response;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_human(&response);
    }

    match (&response.status, &response.error) {
        (Status::Error, Some(err)) => bail!("{}", err.message),
        (Status::Error, None) => bail!("request failed"),
        _ => Ok(()),
    }
}

fn print_human(response: &WeatherResponse) {
    if let Some(summary) = &response.summary {
        println!("{summary}");
    }
    if !response.missing_fields.is_empty() {
        println!(
            "\nUnavailable fields: {}",
            response.missing_fields.join(", ")
        );
    }
    if let Some(artifact) = &response.artifact {
        match (&artifact.filename, &artifact.message) {
            (Some(file), _) => println!("\nSaved report: {file}"),
            (None, Some(message)) => println!("\nReport not saved: {message}"),
            (None, None) => {}
        }
    }
}
