use crate::domain::payment::{IntentPatch, NewPaymentIntent, PatchOutcome, PaymentIntent, UpsertOutcome};
use crate::domain::webhook::{PaymentEventRecord, WebhookReceipt};
use anyhow::Result;
use sqlx::PgPool;

pub mod payment_events_repo;
pub mod payment_intents_repo;
pub mod webhook_receipts_repo;

use payment_events_repo::PaymentEventsRepo;
use payment_intents_repo::PaymentIntentsRepo;
use webhook_receipts_repo::WebhookReceiptsRepo;

/// Durable state of the payments core. Idempotency rests entirely on the
/// implementation: `upsert_intent` must be atomic on both unique keys and
/// hand back the already stored row when it loses a race.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>>;

    async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<PaymentIntent>>;

    async fn upsert_intent(&self, intent: NewPaymentIntent) -> Result<UpsertOutcome>;

    async fn apply_patch(&self, external_reference: &str, patch: IntentPatch) -> Result<PatchOutcome>;

    async fn record_webhook_receipt(&self, receipt: &WebhookReceipt) -> Result<i64>;

    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<i64>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PgPaymentStore {
    pub pool: PgPool,
    pub intents: PaymentIntentsRepo,
    pub receipts: WebhookReceiptsRepo,
    pub events: PaymentEventsRepo,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            intents: PaymentIntentsRepo { pool: pool.clone() },
            receipts: WebhookReceiptsRepo { pool: pool.clone() },
            events: PaymentEventsRepo { pool: pool.clone() },
            pool,
        }
    }
}

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>> {
        self.intents.find_by_idempotency_key(idempotency_key).await
    }

    async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<PaymentIntent>> {
        self.intents.find_by_external_reference(external_reference).await
    }

    async fn upsert_intent(&self, intent: NewPaymentIntent) -> Result<UpsertOutcome> {
        self.intents.upsert(&intent).await
    }

    async fn apply_patch(&self, external_reference: &str, patch: IntentPatch) -> Result<PatchOutcome> {
        self.intents.apply_patch(external_reference, &patch).await
    }

    async fn record_webhook_receipt(&self, receipt: &WebhookReceipt) -> Result<i64> {
        self.receipts.insert(receipt).await
    }

    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<i64> {
        self.events.insert(event).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
