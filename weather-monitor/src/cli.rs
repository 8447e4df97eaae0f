use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use weather_core::{Config, Scheduler, WeatherMonitor};

/// Top-level CLI struct. Takes no flags beyond `--help`/`--version`;
/// all settings come from the environment.
#[derive(Debug, Parser)]
#[command(
    name = "weather-monitor",
    version,
    about = "Polls current weather hourly and forwards it to RabbitMQ or Logstash",
    after_help = "Environment: OPENWEATHER_API_KEY, CITY_NAME, SINK_TYPE, RABBITMQ_HOST, \
                  RABBITMQ_PORT, QUEUE_NAME, LOGSTASH_HOST, LOGSTASH_PORT, SINK_TIMEOUT_SECS, \
                  SUN_TIMES_UTC, RUST_LOG"
)]
pub struct Cli {}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::from_env().context("Invalid configuration")?;
        log::info!("Starting weather monitor: {config}");

        let monitor = WeatherMonitor::from_config(&config)?;

        let shutdown_tx = watch::Sender::new(());
        let mut shutdown_rx = shutdown_tx.subscribe();
        {
            let shutdown_tx = shutdown_tx.clone();
            ctrlc::set_handler(move || {
                log::info!("Received interrupt, stopping after the current cycle");
                let _ = shutdown_tx.send(());
            })
            .context("Failed to install interrupt handler")?;
        }

        println!("Monitoring {} every hour", monitor.city());

        let mut scheduler = Scheduler::default();
        scheduler
            .run(&monitor, async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;

        println!("Stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn runs_without_arguments() {
        assert!(Cli::try_parse_from(["weather-monitor"]).is_ok());
    }

    #[test]
    fn flags_are_rejected() {
        assert!(Cli::try_parse_from(["weather-monitor", "--once"]).is_err());
        assert!(Cli::try_parse_from(["weather-monitor", "Tel Aviv"]).is_err());
    }
}
