use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{Observation, error::FetchError};

use super::WeatherProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("weather-monitor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    city: String,
    api_key: String,
    sun_times_utc: bool,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(
        base_url: String,
        city: String,
        api_key: String,
        sun_times_utc: bool,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { base_url, city, api_key, sun_times_utc, http })
    }

    async fn fetch_current(&self) -> Result<Observation, FetchError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body: truncate_body(&body) });
        }

        parse_current(&body, self.sun_times_utc)
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: i64,
    pressure: i64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: i64,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: i64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    coord: OwCoord,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    clouds: OwClouds,
    sys: OwSys,
    #[serde(default)]
    visibility: i64,
}

/// Normalize a current-weather response body into an [`Observation`].
///
/// Any missing required field, or an empty `weather` list, is a format error.
pub fn parse_current(body: &str, sun_times_utc: bool) -> Result<Observation, FetchError> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Format(e.to_string()))?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Format("missing field `weather[0]`".to_string()))?;

    let sunrise = sun_time(parsed.sys.sunrise, sun_times_utc)?;
    let sunset = sun_time(parsed.sys.sunset, sun_times_utc)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
    let timestamp_ms = Utc::now().timestamp_millis();

    Ok(Observation {
        timestamp,
        timestamp_ms,
        city: parsed.name,
        country: parsed.sys.country,
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity: parsed.main.humidity,
        pressure: parsed.main.pressure,
        description: condition.description,
        weather_main: condition.main,
        wind_speed: parsed.wind.speed,
        wind_direction: parsed.wind.deg,
        visibility: parsed.visibility,
        cloudiness: parsed.clouds.all,
        sunrise,
        sunset,
        coord_lat: parsed.coord.lat,
        coord_lon: parsed.coord.lon,
    })
}

/// Render an epoch as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Without `utc` the wall-clock is the host's local zone while the suffix
/// still reads `Z`; downstream consumers already depend on that shape.
fn sun_time(epoch: i64, utc: bool) -> Result<String, FetchError> {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    let out_of_range = || FetchError::Format(format!("timestamp {epoch} out of range"));

    if utc {
        DateTime::<Utc>::from_timestamp(epoch, 0)
            .map(|dt| dt.format(FORMAT).to_string())
            .ok_or_else(out_of_range)
    } else {
        Local
            .timestamp_opt(epoch, 0)
            .single()
            .map(|dt| dt.format(FORMAT).to_string())
            .ok_or_else(out_of_range)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self) -> Result<Observation, FetchError> {
        match self.fetch_current().await {
            Ok(observation) => {
                println!("Weather: {} {}°C", self.city, observation.temperature);
                Ok(observation)
            }
            Err(e) => {
                log::error!("{e}");
                Err(e)
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
