//! Binary crate for the `weather-agent` command-line host.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup
//! - The stdio request loop standing in for the mesh transport
//! - Interactive configuration and human-friendly output

use clap::Parser;

mod cli;
mod configure;
mod logging;
mod serve;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
