use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::{
    Config,
    alert::{AlertLevel, classify},
    provider::{WeatherProvider, provider_from_config},
    scheduler::Job,
    sink::{Sink, sink_from_config},
};

/// One fetch → classify → publish cycle against a fixed provider and sink.
#[derive(Debug)]
pub struct WeatherMonitor {
    city: String,
    provider: Box<dyn WeatherProvider>,
    sink: Box<dyn Sink>,
}

impl WeatherMonitor {
    pub fn new(city: String, provider: Box<dyn WeatherProvider>, sink: Box<dyn Sink>) -> Self {
        Self { city, provider, sink }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider =
            provider_from_config(config).context("Failed to build OpenWeather HTTP client")?;
        Ok(Self::new(config.city.clone(), provider, sink_from_config(config)))
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// Run one cycle; the returned level is the alert classification of the reading.
    pub async fn collect_and_send(&self) -> Result<AlertLevel> {
        let observation = self.provider.fetch().await.context("Fetching weather failed")?;

        let level = classify(observation.temperature);
        println!("{}", level.message(observation.temperature));
        if level.is_alert() {
            log::warn!("{} temperature {}°C is {level}", observation.city, observation.temperature);
        }

        self.sink
            .publish(&observation)
            .await
            .with_context(|| format!("Publishing to {} failed", self.sink.kind().label()))?;
        println!("Data sent to {}", self.sink.kind().label());

        Ok(level)
    }
}

#[async_trait]
impl Job for WeatherMonitor {
    async fn run(&self) -> Result<()> {
        self.collect_and_send().await.map(|_| ())
    }
}
