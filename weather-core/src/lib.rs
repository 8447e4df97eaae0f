//! Core library for the `weather-monitor` service.
//!
//! This crate defines:
//! - Environment configuration
//! - The OpenWeather fetcher and the normalized observation model
//! - Temperature alert classification
//! - Sinks (RabbitMQ queue, Logstash TCP) behind one trait
//! - The per-cycle monitor and the hourly scheduler
//!
//! It is used by `weather-monitor`, but can also be reused by other binaries or services.

pub mod alert;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod provider;
pub mod scheduler;
pub mod sink;

pub use alert::{AlertLevel, classify};
pub use config::{Config, LogstashSettings, RabbitMqSettings, SinkSettings};
pub use error::{ConfigError, FetchError, PublishError};
pub use model::Observation;
pub use monitor::WeatherMonitor;
pub use provider::WeatherProvider;
pub use scheduler::{Job, Scheduler, SchedulerState};
pub use sink::{Sink, SinkKind};
