use anyhow::{anyhow, Result};
use payment_intents::config::EventsConfig;
use payment_intents::events::consumer::{ConsumeLoop, MessageHandler};
use payment_intents::events::routing_keys;
use tracing_subscriber::EnvFilter;

/// Logs every payment outcome published on the events exchange.
struct LogPaymentEvents;

#[async_trait::async_trait]
impl MessageHandler for LogPaymentEvents {
    async fn handle(&self, routing_key: &str, payload: serde_json::Value) -> Result<()> {
        let external_reference = payload
            .get("externalReference")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("event has no externalReference"))?;
        tracing::info!(
            "[{}] {} status={} payment={}",
            routing_key,
            external_reference,
            payload.get("status").and_then(|v| v.as_str()).unwrap_or("-"),
            payload.get("paymentId").cloned().unwrap_or_default()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = EventsConfig::from_env();
    let consume = ConsumeLoop {
        url: cfg.amqp_url.clone(),
        exchange: cfg.exchange.clone(),
        queue: cfg.tap_queue.clone(),
        binding_key: routing_keys::PAGO_ALL.to_string(),
        consumer_tag: "payment-events-tap".to_string(),
    };

    loop {
        match consume.run(&LogPaymentEvents).await {
            Ok(()) => tracing::warn!("consumer stream ended"),
            Err(e) => tracing::error!("consumer failed: {}", e),
        }
        tokio::time::sleep(cfg.reconnect_delay).await;
    }
}
