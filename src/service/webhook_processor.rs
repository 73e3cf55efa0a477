use crate::domain::payment::{IntentPatch, IntentStatus, PatchOutcome};
use crate::domain::webhook::{
    event_type_for, extract_target, map_provider_status, signed_data_id, PaymentEventRecord, WebhookReceipt,
    PAYMENT_TOPIC,
};
use crate::error::{persistence, provider, ServiceError};
use crate::events::EventPublisher;
use crate::gateways::PaymentProviderGateway;
use crate::repo::PaymentStore;
use crate::signature;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub signature: Option<String>,
    pub request_id: Option<String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Set when `body` holds only the first `MAX_WEBHOOK_BODY` bytes.
    pub truncated: bool,
}

pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Non-payment topic or no resource id.
    Ignored,
    /// Provider payment has no external reference to correlate with.
    Uncorrelated,
    /// No intent exists for the payment's external reference.
    UnknownIntent,
    /// The intent is already past the reported status.
    Stale { current: IntentStatus },
    Processed {
        external_reference: String,
        status: IntentStatus,
        routing_key: &'static str,
        published: bool,
    },
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            WebhookOutcome::Ignored => "webhook received (no action)",
            WebhookOutcome::Uncorrelated => "payment without external_reference",
            WebhookOutcome::UnknownIntent => "no payment intent for external_reference",
            WebhookOutcome::Stale { .. } => "webhook received (status already advanced)",
            WebhookOutcome::Processed { .. } => "webhook processed",
        }
    }
}

#[derive(Clone)]
pub struct WebhookProcessor {
    pub store: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentProviderGateway>,
    pub publisher: Arc<dyn EventPublisher>,
    pub webhook_secret: Option<String>,
}

impl WebhookProcessor {
    pub async fn handle(&self, req: WebhookRequest) -> Result<WebhookOutcome, ServiceError> {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);
        let target = extract_target(&body, &req.query);
        let signed_id = signed_data_id(&body, &req.query);

        let signature_valid = signature::verify(
            req.signature.as_deref(),
            req.request_id.as_deref(),
            signed_id.as_deref(),
            self.webhook_secret.as_deref(),
        );

        // The receipt goes in before anything else can fail or return.
        let receipt = WebhookReceipt {
            topic: target.topic.clone(),
            provider_resource_id: target.data_id.clone(),
            request_id: req.request_id.clone(),
            signature_valid,
            raw_body: String::from_utf8_lossy(&req.body).into_owned(),
        };
        let receipt_id = self
            .store
            .record_webhook_receipt(&receipt)
            .await
            .map_err(persistence)?;
        tracing::info!(
            receipt_id,
            "webhook received topic={} resource={:?} signature_valid={}",
            target.topic,
            target.data_id,
            signature_valid
        );

        if req.truncated {
            tracing::warn!(receipt_id, "rejecting oversized webhook body");
            return Err(ServiceError::PayloadTooLarge(MAX_WEBHOOK_BODY));
        }

        if !signature_valid {
            tracing::warn!(receipt_id, "rejecting webhook with invalid signature");
            return Err(ServiceError::SignatureInvalid);
        }

        let data_id = match target.data_id {
            Some(id) if target.topic == PAYMENT_TOPIC => id,
            _ => return Ok(WebhookOutcome::Ignored),
        };

        let payment = self.gateway.get_payment(&data_id).await.map_err(provider)?;
        let Some(external_reference) = payment.external_reference.clone() else {
            tracing::info!("payment {} has no external_reference; nothing to update", payment.id);
            return Ok(WebhookOutcome::Uncorrelated);
        };

        let (status, routing_key) = map_provider_status(&payment.status);
        let patch = IntentPatch {
            status: Some(status),
            provider_payment_id: Some(payment.id.clone()).filter(|id| !id.is_empty()),
        };

        let intent = match self
            .store
            .apply_patch(&external_reference, patch)
            .await
            .map_err(persistence)?
        {
            PatchOutcome::Applied(intent) => intent,
            PatchOutcome::Stale(current) => {
                tracing::info!(
                    "ignoring {} for {}: intent is already {}",
                    payment.status,
                    external_reference,
                    current.status
                );
                return Ok(WebhookOutcome::Stale {
                    current: current.status,
                });
            }
            PatchOutcome::NotFound => {
                tracing::warn!(
                    "payment {} references unknown intent {}",
                    payment.id,
                    external_reference
                );
                return Ok(WebhookOutcome::UnknownIntent);
            }
        };
        tracing::info!("intent {} is now {} (payment {})", external_reference, status, payment.id);

        self.store
            .record_payment_event(&PaymentEventRecord {
                external_reference: external_reference.clone(),
                event_type: event_type_for(&payment.status),
                payload_json: payment.raw.clone(),
            })
            .await
            .map_err(persistence)?;

        let event = json!({
            "provider": self.gateway.name(),
            "externalReference": external_reference,
            "paymentId": payment.raw.get("id").cloned().unwrap_or_else(|| json!(payment.id)),
            "status": payment.status,
            "transactionAmount": payment.raw.get("transaction_amount").cloned(),
            "userId": intent.user_id,
        });
        let published = match self.publisher.publish(routing_key, event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "publishing {} for {} failed: {}",
                    routing_key,
                    external_reference,
                    e
                );
                false
            }
        };

        Ok(WebhookOutcome::Processed {
            external_reference,
            status,
            routing_key,
            published,
        })
    }
}
