use crate::events::{stamp, EventPublisher, PublishError};
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub exchange: String,
    pub reconnect_delay: Duration,
    pub health_check_interval: Duration,
}

/// An open connection plus channel with the exchange already declared.
#[async_trait::async_trait]
pub trait BrokerLink: Send + Sync {
    fn is_open(&self) -> bool;

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), PublishError>;

    /// Best-effort; errors are logged, never returned.
    async fn close(&self);
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, settings: &BrokerSettings) -> anyhow::Result<Arc<dyn BrokerLink>>;
}

/// RabbitMQ over `lapin`.
pub struct AmqpConnector;

struct AmqpLink {
    connection: Connection,
    channel: Channel,
}

#[async_trait::async_trait]
impl Connector for AmqpConnector {
    async fn open(&self, settings: &BrokerSettings) -> anyhow::Result<Arc<dyn BrokerLink>> {
        let connection = Connection::connect(&settings.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &settings.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Arc::new(AmqpLink { connection, channel }))
    }
}

#[async_trait::async_trait]
impl BrokerLink for AmqpLink {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), PublishError> {
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.channel.close(200, "shutdown").await {
            tracing::debug!("closing broker channel: {}", e);
        }
        if let Err(e) = self.connection.close(200, "shutdown").await {
            tracing::debug!("closing broker connection: {}", e);
        }
    }
}

struct Inner {
    settings: BrokerSettings,
    connector: Arc<dyn Connector>,
    link: RwLock<Option<Arc<dyn BrokerLink>>>,
    attempts: AtomicU64,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the process-wide broker link. Publishers only read the current link;
/// the supervisor task is the only writer while running.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<Inner>,
}

impl BrokerConnection {
    pub fn new(settings: BrokerSettings) -> Self {
        Self::with_connector(settings, Arc::new(AmqpConnector))
    }

    pub fn with_connector(settings: BrokerSettings, connector: Arc<dyn Connector>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                settings,
                connector,
                link: RwLock::new(None),
                attempts: AtomicU64::new(0),
                shutdown,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Starts the supervisor, which connects in the background and keeps
    /// reconnecting after every loss. Calling it again is a no-op.
    pub fn connect(&self) {
        let Ok(mut slot) = self.inner.supervisor.lock() else {
            tracing::error!("broker supervisor slot poisoned; not starting");
            return;
        };
        if slot.is_some() {
            return;
        }
        let inner = self.inner.clone();
        let shutdown = self.inner.shutdown.subscribe();
        *slot = Some(tokio::spawn(supervise(inner, shutdown)));
    }

    pub fn connect_attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    pub fn exchange(&self) -> &str {
        &self.inner.settings.exchange
    }

    /// Stops the supervisor, then closes channel and connection.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);

        let handle = self.inner.supervisor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("broker supervisor ended abnormally: {}", e);
            }
        }

        let link = self.inner.link.write().await.take();
        if let Some(link) = link {
            link.close().await;
        }
        tracing::info!("broker connection closed");
    }
}

#[async_trait::async_trait]
impl EventPublisher for BrokerConnection {
    async fn publish(&self, routing_key: &str, payload: serde_json::Value) -> Result<(), PublishError> {
        let link = self
            .inner
            .link
            .read()
            .await
            .as_ref()
            .filter(|l| l.is_open())
            .cloned()
            .ok_or(PublishError::ChannelUnavailable)?;

        let message = stamp(payload, chrono::Utc::now());
        let body = serde_json::to_vec(&message)?;
        link.publish(&self.inner.settings.exchange, routing_key, &body).await?;

        tracing::info!(routing_key, "published {}", message);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner
            .link
            .read()
            .await
            .as_ref()
            .is_some_and(|l| l.is_open())
    }
}

async fn supervise(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let delay = inner.settings.reconnect_delay;
    loop {
        if *shutdown.borrow() {
            return;
        }

        let attempt = inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("broker connect attempt {} (exchange {})", attempt, inner.settings.exchange);

        match inner.connector.open(&inner.settings).await {
            Ok(link) => {
                tracing::info!("broker connected, exchange {} declared", inner.settings.exchange);
                *inner.link.write().await = Some(link.clone());

                if watch_link(link.as_ref(), inner.settings.health_check_interval, &mut shutdown).await {
                    return;
                }

                inner.link.write().await.take();
                link.close().await;
                tracing::warn!("broker connection lost; reconnecting in {:?}", delay);
            }
            Err(e) => {
                tracing::error!("broker connect attempt {} failed: {:#}; retrying in {:?}", attempt, e, delay);
            }
        }

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Polls link health until it drops. Returns true when shutdown was
/// requested instead.
async fn watch_link(link: &dyn BrokerLink, interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return true,
            _ = tokio::time::sleep(interval) => {}
        }
        if !link.is_open() {
            return false;
        }
    }
}
