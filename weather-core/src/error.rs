use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Invalid environment configuration, reported before the monitor starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown sink type '{0}'. Supported sinks: rabbitmq, logstash.")]
    UnknownSink(String),
}

/// A single failed attempt to retrieve the current observation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected API response format: {0}")]
    Format(String),
}

/// A single failed delivery to the configured sink.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize observation: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("Collector I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Broker rejected the message for queue '{0}'")]
    Nacked(String),
}
