#![allow(dead_code)]

use anyhow::{anyhow, Result};
use payment_intents::domain::payment::{
    IntentPatch, NewPaymentIntent, PatchOutcome, PaymentIntent, UpsertOutcome,
};
use payment_intents::domain::webhook::{PaymentEventRecord, WebhookReceipt};
use payment_intents::events::{EventPublisher, PublishError};
use payment_intents::gateways::{
    BackUrls, CreatedPreference, PaymentProviderGateway, PreferenceRequest, ProviderPayment,
};
use payment_intents::repo::PaymentStore;
use payment_intents::service::preference_service::CheckoutSettings;
use payment_intents::signature;
use payment_intents::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "test-webhook-secret";

/// Store with the same uniqueness and monotonic-status rules as the
/// Postgres tables, guarded by a single lock.
#[derive(Default)]
pub struct InMemoryStore {
    intents: Mutex<Vec<PaymentIntent>>,
    receipts: Mutex<Vec<WebhookReceipt>>,
    events: Mutex<Vec<PaymentEventRecord>>,
}

impl InMemoryStore {
    pub fn intents(&self) -> Vec<PaymentIntent> {
        self.intents.lock().unwrap().clone()
    }

    pub fn receipts(&self) -> Vec<WebhookReceipt> {
        self.receipts.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<PaymentEventRecord> {
        self.events.lock().unwrap().clone()
    }

    pub fn intent(&self, external_reference: &str) -> Option<PaymentIntent> {
        self.intents()
            .into_iter()
            .find(|i| i.external_reference == external_reference)
    }

    /// Inserts a row directly, as an earlier process run would have left it.
    pub fn seed(&self, intent: PaymentIntent) {
        self.intents.lock().unwrap().push(intent);
    }
}

#[async_trait::async_trait]
impl PaymentStore for InMemoryStore {
    async fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>> {
        Ok(self
            .intents()
            .into_iter()
            .find(|i| i.idempotency_key == idempotency_key))
    }

    async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<PaymentIntent>> {
        Ok(self.intent(external_reference))
    }

    async fn upsert_intent(&self, new: NewPaymentIntent) -> Result<UpsertOutcome> {
        let mut intents = self.intents.lock().unwrap();

        if let Some(existing) = intents
            .iter_mut()
            .find(|i| i.external_reference == new.external_reference)
        {
            if existing.init_point.is_some() {
                return Ok(UpsertOutcome {
                    intent: existing.clone(),
                    written: false,
                });
            }
            existing.amount = new.amount;
            existing.currency = new.currency;
            existing.status = new.status;
            existing.provider_preference_id = new.provider_preference_id;
            existing.init_point = new.init_point;
            existing.sandbox_init_point = new.sandbox_init_point;
            existing.updated_at = chrono::Utc::now();
            return Ok(UpsertOutcome {
                intent: existing.clone(),
                written: true,
            });
        }

        if let Some(existing) = intents
            .iter()
            .find(|i| i.idempotency_key == new.idempotency_key)
        {
            return Ok(UpsertOutcome {
                intent: existing.clone(),
                written: false,
            });
        }

        let now = chrono::Utc::now();
        let intent = PaymentIntent {
            order_id: new.order_id,
            user_id: new.user_id,
            external_reference: new.external_reference,
            idempotency_key: new.idempotency_key,
            amount: new.amount,
            currency: new.currency,
            status: new.status,
            provider_preference_id: new.provider_preference_id,
            provider_payment_id: new.provider_payment_id,
            init_point: new.init_point,
            sandbox_init_point: new.sandbox_init_point,
            created_at: now,
            updated_at: now,
        };
        intents.push(intent.clone());
        Ok(UpsertOutcome {
            intent,
            written: true,
        })
    }

    async fn apply_patch(&self, external_reference: &str, patch: IntentPatch) -> Result<PatchOutcome> {
        let mut intents = self.intents.lock().unwrap();
        let Some(intent) = intents
            .iter_mut()
            .find(|i| i.external_reference == external_reference)
        else {
            return Ok(PatchOutcome::NotFound);
        };

        if let Some(next) = patch.status {
            if !intent.status.can_advance_to(next) {
                return Ok(PatchOutcome::Stale(intent.clone()));
            }
            intent.status = next;
        }
        if let Some(payment_id) = patch.provider_payment_id {
            intent.provider_payment_id = Some(payment_id);
        }
        intent.updated_at = chrono::Utc::now();
        Ok(PatchOutcome::Applied(intent.clone()))
    }

    async fn record_webhook_receipt(&self, receipt: &WebhookReceipt) -> Result<i64> {
        let mut receipts = self.receipts.lock().unwrap();
        receipts.push(receipt.clone());
        Ok(receipts.len() as i64)
    }

    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<i64> {
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        Ok(events.len() as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Provider double. Every payment lookup returns `payment`, and preference
/// creation can be slowed down to widen race windows.
pub struct ScriptedGateway {
    pub payment: Mutex<serde_json::Value>,
    pub fail: AtomicBool,
    pub delay: Duration,
    pub preference_calls: AtomicUsize,
    pub payment_calls: AtomicUsize,
    pub last_request: Mutex<Option<PreferenceRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            payment: Mutex::new(serde_json::Value::Null),
            fail: AtomicBool::new(false),
            delay: Duration::ZERO,
            preference_calls: AtomicUsize::new(0),
            payment_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn returning_payment(payment: serde_json::Value) -> Self {
        let gateway = Self::new();
        *gateway.payment.lock().unwrap() = payment;
        gateway
    }

    pub fn preference_calls(&self) -> usize {
        self.preference_calls.load(Ordering::SeqCst)
    }

    pub fn payment_calls(&self) -> usize {
        self.payment_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PaymentProviderGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "mercadopago"
    }

    async fn create_preference(&self, request: PreferenceRequest) -> Result<CreatedPreference> {
        let n = self.preference_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("provider unavailable"));
        }
        *self.last_request.lock().unwrap() = Some(request);
        Ok(CreatedPreference {
            id: Some(format!("pref-{}", n)),
            init_point: Some(format!("https://checkout.test/init/pref-{}", n)),
            sandbox_init_point: Some(format!("https://sandbox.checkout.test/init/pref-{}", n)),
        })
    }

    async fn get_payment(&self, _payment_id: &str) -> Result<ProviderPayment> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("provider unavailable"));
        }
        Ok(ProviderPayment::from_json(self.payment.lock().unwrap().clone()))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, serde_json::Value)>>,
    pub fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, routing_key: &str, payload: serde_json::Value) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::ChannelUnavailable);
        }
        self.published
            .lock()
            .unwrap()
            .push((routing_key.to_string(), payload));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.fail.load(Ordering::SeqCst)
    }
}

pub fn checkout_settings() -> CheckoutSettings {
    CheckoutSettings {
        notification_url: "https://pagos.test/pagos/webhook".to_string(),
        back_urls: BackUrls {
            success: "https://shop.test/pago/success".to_string(),
            pending: "https://shop.test/pago/pending".to_string(),
            failure: "https://shop.test/pago/failure".to_string(),
        },
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub state: AppState,
}

pub fn harness(gateway: ScriptedGateway, publisher: RecordingPublisher) -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let gateway = Arc::new(gateway);
    let publisher = Arc::new(publisher);
    let state = AppState::new(
        store.clone(),
        gateway.clone(),
        publisher.clone(),
        checkout_settings(),
        Some(SECRET.to_string()),
    );
    Harness {
        store,
        gateway,
        publisher,
        state,
    }
}

pub fn signature_header(data_id: &str, request_id: &str, ts: &str) -> String {
    let v1 = signature::sign_manifest(&signature::manifest(data_id, request_id, ts), SECRET)
        .expect("hmac accepts any key length");
    format!("ts={},v1={}", ts, v1)
}
