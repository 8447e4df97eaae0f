use std::time::Duration;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::{Observation, config::LogstashSettings, error::PublishError};

use super::{Sink, SinkKind};

/// Writes one newline-terminated JSON document per connection.
#[derive(Debug, Clone)]
pub struct LogstashSink {
    settings: LogstashSettings,
    timeout: Duration,
}

impl LogstashSink {
    pub fn new(settings: LogstashSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    async fn send_line(&self, line: &[u8]) -> Result<(), PublishError> {
        let mut stream =
            TcpStream::connect((self.settings.host.as_str(), self.settings.port)).await?;
        stream.write_all(line).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for LogstashSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Logstash
    }

    async fn publish(&self, observation: &Observation) -> Result<(), PublishError> {
        let mut line = observation.to_json()?.into_bytes();
        line.push(b'\n');

        let result = match tokio::time::timeout(self.timeout, self.send_line(&line)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.timeout)),
        };

        if let Err(e) = &result {
            log::error!(
                "Failed to send data to Logstash at {}:{}: {e}",
                self.settings.host,
                self.settings.port
            );
        }
        result
    }
}
