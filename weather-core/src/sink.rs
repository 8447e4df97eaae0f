use crate::{
    Config, Observation,
    config::SinkSettings,
    error::{ConfigError, PublishError},
    sink::{logstash::LogstashSink, rabbitmq::RabbitMqSink},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};

pub mod logstash;
pub mod rabbitmq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    RabbitMq,
    Logstash,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::RabbitMq => "rabbitmq",
            SinkKind::Logstash => "logstash",
        }
    }

    /// Name used in progress output, e.g. "Data sent to RabbitMQ".
    pub fn label(&self) -> &'static str {
        match self {
            SinkKind::RabbitMq => "RabbitMQ",
            SinkKind::Logstash => "Logstash",
        }
    }

    pub const fn all() -> &'static [SinkKind] {
        &[SinkKind::RabbitMq, SinkKind::Logstash]
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SinkKind {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "rabbitmq" | "amqp" => Ok(SinkKind::RabbitMq),
            "logstash" | "tcp" => Ok(SinkKind::Logstash),
            _ => Err(ConfigError::UnknownSink(value.to_string())),
        }
    }
}

/// Downstream destination for observations. One publish per cycle, no buffering.
#[async_trait]
pub trait Sink: Send + Sync + Debug {
    fn kind(&self) -> SinkKind;

    async fn publish(&self, observation: &Observation) -> Result<(), PublishError>;
}

/// Construct the sink selected by the config.
pub fn sink_from_config(config: &Config) -> Box<dyn Sink> {
    match &config.sink {
        SinkSettings::RabbitMq(settings) => {
            Box::new(RabbitMqSink::new(settings.clone(), config.sink_timeout))
        }
        SinkSettings::Logstash(settings) => {
            Box::new(LogstashSink::new(settings.clone(), config.sink_timeout))
        }
    }
}
