use std::{fmt, str::FromStr, time::Duration};

use crate::{error::ConfigError, sink::SinkKind};

pub const DEFAULT_API_KEY: &str = "your_api_key_here";
pub const DEFAULT_CITY: &str = "Tel Aviv";
pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the RabbitMQ sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabbitMqSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub queue: String,
}

impl Default for RabbitMqSettings {
    fn default() -> Self {
        Self {
            host: "rabbitmq".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            queue: "weather_data".to_string(),
        }
    }
}

/// Connection settings for the Logstash TCP collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogstashSettings {
    pub host: String,
    pub port: u16,
}

impl Default for LogstashSettings {
    fn default() -> Self {
        Self { host: "logstash".to_string(), port: 5000 }
    }
}

/// The one sink this deployment publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkSettings {
    RabbitMq(RabbitMqSettings),
    Logstash(LogstashSettings),
}

impl SinkSettings {
    pub fn kind(&self) -> SinkKind {
        match self {
            SinkSettings::RabbitMq(_) => SinkKind::RabbitMq,
            SinkSettings::Logstash(_) => SinkKind::Logstash,
        }
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        SinkSettings::RabbitMq(RabbitMqSettings::default())
    }
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub city: String,
    pub base_url: String,
    pub sink: SinkSettings,
    /// Upper bound on connecting to and writing to the sink.
    pub sink_timeout: Duration,
    /// Render sunrise/sunset in UTC instead of the host's local time.
    pub sun_times_utc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            city: DEFAULT_CITY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sink: SinkSettings::default(),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            sun_times_utc: false,
        }
    }
}

impl Config {
    /// Load config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through `lookup`; unset or blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Config::default();

        let sink_kind = match get("SINK_TYPE") {
            Some(raw) => SinkKind::try_from(raw.as_str())?,
            None => SinkKind::RabbitMq,
        };

        let sink = match sink_kind {
            SinkKind::RabbitMq => {
                let d = RabbitMqSettings::default();
                SinkSettings::RabbitMq(RabbitMqSettings {
                    host: get("RABBITMQ_HOST").unwrap_or(d.host),
                    port: parse_or("RABBITMQ_PORT", get("RABBITMQ_PORT"), d.port)?,
                    user: get("RABBITMQ_USER").unwrap_or(d.user),
                    password: get("RABBITMQ_PASSWORD").unwrap_or(d.password),
                    vhost: get("RABBITMQ_VHOST").unwrap_or(d.vhost),
                    queue: get("QUEUE_NAME").unwrap_or(d.queue),
                })
            }
            SinkKind::Logstash => {
                let d = LogstashSettings::default();
                SinkSettings::Logstash(LogstashSettings {
                    host: get("LOGSTASH_HOST").unwrap_or(d.host),
                    port: parse_or("LOGSTASH_PORT", get("LOGSTASH_PORT"), d.port)?,
                })
            }
        };

        let timeout_secs = parse_or(
            "SINK_TIMEOUT_SECS",
            get("SINK_TIMEOUT_SECS"),
            defaults.sink_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SINK_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(Self {
            api_key: get("OPENWEATHER_API_KEY").unwrap_or(defaults.api_key),
            city: get("CITY_NAME").unwrap_or(defaults.city),
            base_url: get("OPENWEATHER_BASE_URL").unwrap_or(defaults.base_url),
            sink,
            sink_timeout: Duration::from_secs(timeout_secs),
            sun_times_utc: parse_bool("SUN_TIMES_UTC", get("SUN_TIMES_UTC"))?,
        })
    }
}

/// Redacted summary for startup logging.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "city={:?} api={} ", self.city, self.base_url)?;
        match &self.sink {
            SinkSettings::RabbitMq(s) => write!(
                f,
                "sink=rabbitmq amqp://{}@{}:{} vhost={:?} queue={:?}",
                s.user, s.host, s.port, s.vhost, s.queue
            )?,
            SinkSettings::Logstash(s) => write!(f, "sink=logstash tcp://{}:{}", s.host, s.port)?,
        }
        write!(f, " timeout={}s", self.sink_timeout.as_secs())
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}
