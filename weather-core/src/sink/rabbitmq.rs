use std::{
    net::{Shutdown, TcpStream as StdTcpStream},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use lapin::{
    BasicProperties, Connection, ConnectionProperties,
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    publisher_confirm::Confirmation,
    tcp::{AMQPUriTcpExt, HandshakeResult},
    types::FieldTable,
    uri::{AMQPAuthority, AMQPUri, AMQPUserInfo},
};

use crate::{Observation, config::RabbitMqSettings, error::PublishError};

use super::{Sink, SinkKind};

/// AMQP delivery mode that asks the broker to persist the message.
const PERSISTENT: u8 = 2;
/// Publishing to the default exchange routes by queue name.
const DEFAULT_EXCHANGE: &str = "";

/// Publishes each observation as a persistent message on a durable queue,
/// over a connection opened and closed per call.
#[derive(Debug, Clone)]
pub struct RabbitMqSink {
    settings: RabbitMqSettings,
    timeout: Duration,
}

impl RabbitMqSink {
    pub fn new(settings: RabbitMqSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.settings.user.clone(),
                    password: self.settings.password.clone(),
                },
                host: self.settings.host.clone(),
                port: self.settings.port,
            },
            vhost: self.settings.vhost.clone(),
            ..AMQPUri::default()
        }
    }

    fn routing_key(&self) -> &str {
        &self.settings.queue
    }

    /// Connect, publish and close, each step bounded by the sink timeout.
    /// The socket is shut down on every exit path, so a timed-out step never
    /// leaves the broker connection or its I/O loop behind.
    async fn send(&self, payload: &[u8]) -> Result<(), PublishError> {
        let socket = SocketGuard::default();

        let connect = Connection::connector(
            self.uri(),
            socket.connector(),
            ConnectionProperties::default(),
        );
        let connection = self.bounded(connect).await??;

        let result = self
            .bounded(self.publish_on(&connection, payload))
            .await
            .and_then(|published| published);

        let closed = self.bounded(connection.close(200, "OK")).await;
        if let Err(e) = closed.and_then(|r| r.map_err(PublishError::from)) {
            log::debug!("Closing RabbitMQ connection failed: {e}");
        }
        result
    }

    async fn bounded<F: std::future::Future>(&self, step: F) -> Result<F::Output, PublishError> {
        tokio::time::timeout(self.timeout, step)
            .await
            .map_err(|_| PublishError::Timeout(self.timeout))
    }

    async fn publish_on(&self, connection: &Connection, payload: &[u8]) -> Result<(), PublishError> {
        let channel = connection.create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;

        channel
            .queue_declare(&self.settings.queue, declare_options(), FieldTable::default())
            .await?;

        let confirmation = channel
            .basic_publish(
                DEFAULT_EXCHANGE,
                self.routing_key(),
                BasicPublishOptions::default(),
                payload,
                message_properties(),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(PublishError::Nacked(self.settings.queue.clone())),
            _ => Ok(()),
        }
    }
}

/// Idempotent declare of a queue that survives broker restarts.
fn declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() }
}

fn message_properties() -> BasicProperties {
    BasicProperties::default().with_delivery_mode(PERSISTENT)
}

#[derive(Debug, Default)]
struct SocketSlot {
    stream: Option<StdTcpStream>,
    released: bool,
}

/// Holds a duplicate handle of the broker socket and shuts it down on drop.
#[derive(Debug, Default)]
struct SocketGuard(Arc<Mutex<SocketSlot>>);

impl SocketGuard {
    fn connector(&self) -> Box<dyn FnOnce(&AMQPUri) -> HandshakeResult + Send + Sync> {
        let slot = self.0.clone();
        Box::new(move |uri: &AMQPUri| -> HandshakeResult {
            let stream = uri.connect()?;
            if let Ok(handle) = stream.try_clone() {
                let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
                if slot.released {
                    let _ = handle.shutdown(Shutdown::Both);
                } else {
                    slot.stream = Some(handle);
                }
            }
            Ok(stream)
        })
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        slot.released = true;
        if let Some(stream) = slot.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

#[async_trait]
impl Sink for RabbitMqSink {
    fn kind(&self) -> SinkKind {
        SinkKind::RabbitMq
    }

    async fn publish(&self, observation: &Observation) -> Result<(), PublishError> {
        let payload = observation.to_json()?;

        let result = self.send(payload.as_bytes()).await;

        if let Err(e) = &result {
            log::error!("Failed to send data to RabbitMQ: {e}");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_observation;
    use lapin::options::{BasicGetOptions, QueueDeleteOptions};
    use tokio::{io::AsyncReadExt, net::TcpListener};

    fn local_sink(port: u16, timeout: Duration) -> RabbitMqSink {
        RabbitMqSink::new(
            RabbitMqSettings { host: "127.0.0.1".into(), port, ..RabbitMqSettings::default() },
            timeout,
        )
    }

    #[test]
    fn uri_carries_credentials_and_vhost() {
        let sink = RabbitMqSink::new(
            RabbitMqSettings {
                host: "broker".into(),
                port: 5673,
                user: "monitor".into(),
                password: "s3cret".into(),
                vhost: "weather".into(),
                queue: "weather_data".into(),
            },
            Duration::from_secs(1),
        );

        let uri = sink.uri();
        assert_eq!(uri.authority.host, "broker");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.username, "monitor");
        assert_eq!(uri.authority.userinfo.password, "s3cret");
        assert_eq!(uri.vhost, "weather");
    }

    #[test]
    fn queue_is_declared_durable() {
        let options = declare_options();
        assert!(options.durable);
        assert!(!options.passive);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
    }

    #[test]
    fn messages_are_persistent() {
        assert_eq!(*message_properties().delivery_mode(), Some(2));
    }

    #[test]
    fn routes_through_default_exchange_by_queue_name() {
        let sink = RabbitMqSink::new(
            RabbitMqSettings { queue: "readings".into(), ..RabbitMqSettings::default() },
            Duration::from_secs(1),
        );
        assert_eq!(DEFAULT_EXCHANGE, "");
        assert_eq!(sink.routing_key(), "readings");
    }

    #[tokio::test]
    async fn unreachable_broker_is_a_publish_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = local_sink(port, Duration::from_secs(5))
            .publish(&sample_observation())
            .await
            .unwrap_err();
        assert!(
            matches!(err, PublishError::Broker(_) | PublishError::Timeout(_)),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn silent_broker_times_out_and_connection_is_released() {
        // Reads the protocol header but never answers it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 8];
            socket.read_exact(&mut header).await.unwrap();
            assert_eq!(&header[..4], b"AMQP");

            let mut rest = [0u8; 64];
            match tokio::time::timeout(Duration::from_secs(5), socket.read(&mut rest)).await {
                Ok(Ok(0)) | Ok(Err(_)) => true,
                Ok(Ok(_)) | Err(_) => false,
            }
        });

        let err = local_sink(port, Duration::from_millis(300))
            .publish(&sample_observation())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)), "unexpected error: {err}");

        let released = broker.await.unwrap();
        assert!(released, "broker socket still open after the publish timed out");
    }

    /// Needs a live broker: `RABBITMQ_HOST=localhost cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn publishes_persistent_message_to_live_broker() {
        let host = std::env::var("RABBITMQ_HOST").unwrap_or_else(|_| "localhost".to_string());
        let queue = format!("weather_data_test_{}", std::process::id());
        let sink = RabbitMqSink::new(
            RabbitMqSettings { host, queue: queue.clone(), ..RabbitMqSettings::default() },
            Duration::from_secs(10),
        );

        let obs = sample_observation();
        sink.publish(&obs).await.expect("publish should succeed");

        let connection = Connection::connect_uri(sink.uri(), ConnectionProperties::default())
            .await
            .unwrap();
        let channel = connection.create_channel().await.unwrap();
        let message = channel
            .basic_get(&queue, BasicGetOptions { no_ack: true })
            .await
            .unwrap()
            .expect("queue should hold the published message");

        let delivery = message.delivery;
        assert_eq!(delivery.exchange.as_str(), "");
        assert_eq!(delivery.routing_key.as_str(), queue);
        assert_eq!(*delivery.properties.delivery_mode(), Some(2));
        let received: Observation = serde_json::from_slice(&delivery.data).unwrap();
        assert_eq!(received, obs);

        channel.queue_delete(&queue, QueueDeleteOptions::default()).await.unwrap();
        connection.close(200, "OK").await.unwrap();
    }
}
