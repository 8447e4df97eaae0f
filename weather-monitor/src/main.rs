//! Binary crate for the `weather-monitor` service.
//!
//! This crate focuses on:
//! - Logging setup
//! - Interrupt handling
//! - Driving the hourly schedule from `weather-core`

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
