use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, ExchangeKind};

#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, routing_key: &str, payload: serde_json::Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
    Reject,
}

/// A message gets one redelivery. If it fails again it is nacked without
/// requeue so the broker drops it or routes it to a dead-letter exchange.
pub fn disposition(handled: &anyhow::Result<()>, redelivered: bool) -> Disposition {
    match (handled, redelivered) {
        (Ok(()), _) => Disposition::Ack,
        (Err(_), false) => Disposition::Requeue,
        (Err(_), true) => Disposition::Reject,
    }
}

#[derive(Debug, Clone)]
pub struct ConsumeLoop {
    pub url: String,
    pub exchange: String,
    pub queue: String,
    pub binding_key: String,
    pub consumer_tag: String,
}

impl ConsumeLoop {
    /// Consumes with prefetch 1 until the stream ends or the connection
    /// fails. Each delivery is settled according to the handler's result
    /// before the next one is received.
    pub async fn run<H: MessageHandler>(&self, handler: &H) -> Result<(), lapin::Error> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                &self.binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        let mut consumer = channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        tracing::info!("consuming {} bound to {} on {}", self.queue, self.binding_key, self.exchange);

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let routing_key = delivery.routing_key.as_str().to_string();

            let handled = match serde_json::from_slice::<serde_json::Value>(&delivery.data) {
                Ok(payload) => handler.handle(&routing_key, payload).await,
                Err(e) => Err(anyhow::Error::new(e).context("payload is not JSON")),
            };

            match disposition(&handled, delivery.redelivered) {
                Disposition::Ack => {
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Disposition::Requeue => {
                    if let Err(e) = &handled {
                        tracing::warn!("message [{}] failed, requeueing: {:#}", routing_key, e);
                    }
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await?;
                }
                Disposition::Reject => {
                    if let Err(e) = &handled {
                        tracing::error!("message [{}] failed after redelivery, rejecting: {:#}", routing_key, e);
                    }
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        })
                        .await?;
                }
            }
        }

        Ok(())
    }
}
