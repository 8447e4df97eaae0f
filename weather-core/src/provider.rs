use crate::{Config, Observation, error::FetchError, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of the current observation for the configured city.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self) -> Result<Observation, FetchError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn WeatherProvider>, FetchError> {
    let provider = OpenWeatherProvider::new(
        config.base_url.clone(),
        config.city.clone(),
        config.api_key.clone(),
        config.sun_times_utc,
    )?;

    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_default_config_builds() {
        let provider = provider_from_config(&Config::default());
        assert!(provider.is_ok());
    }
}
