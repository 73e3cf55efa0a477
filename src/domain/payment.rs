use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    Cop,
    Ars,
    Brl,
    Mxn,
    Pen,
    Clp,
    Uyu,
}

/// Lifecycle of a checkout attempt. Only verified webhooks move a row past
/// `PreferenceCreated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntentStatus {
    PreferenceCreated,
    Pending,
    Approved,
    Rejected,
}

impl IntentStatus {
    fn rank(self) -> u8 {
        match self {
            IntentStatus::PreferenceCreated => 0,
            IntentStatus::Pending => 1,
            IntentStatus::Approved | IntentStatus::Rejected => 2,
        }
    }

    /// Statuses a row may currently hold for `self` to be applied on top of it.
    pub fn overwritable_from(self) -> Vec<IntentStatus> {
        [
            IntentStatus::PreferenceCreated,
            IntentStatus::Pending,
            IntentStatus::Approved,
            IntentStatus::Rejected,
        ]
        .into_iter()
        .filter(|current| current.rank() <= self.rank())
        .collect()
    }

    pub fn can_advance_to(self, next: IntentStatus) -> bool {
        self.rank() <= next.rank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentIntent {
    pub order_id: String,
    pub user_id: i64,
    pub external_reference: String,
    pub idempotency_key: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: IntentStatus,
    pub provider_preference_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn has_checkout_url(&self) -> bool {
        self.init_point.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Values written by the preference upsert. `provider_payment_id` is only
/// written when present; an existing one is kept otherwise.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub order_id: String,
    pub user_id: i64,
    pub external_reference: String,
    pub idempotency_key: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: IntentStatus,
    pub provider_preference_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub intent: PaymentIntent,
    /// False when another writer already stored a checkout URL for the same
    /// key and its row was returned untouched.
    pub written: bool,
}

/// Partial update applied by the webhook path. Each field maps to exactly one
/// column; `None` leaves the column as it is.
#[derive(Debug, Clone, Default)]
pub struct IntentPatch {
    pub status: Option<IntentStatus>,
    pub provider_payment_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Applied(PaymentIntent),
    Stale(PaymentIntent),
    NotFound,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreferenceRequest {
    pub order_id: Option<String>,
    pub user_id: Option<i64>,
    pub title: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub external_reference: String,
    pub preference_id: Option<String>,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IntentStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub external_reference: String,
    pub order_id: String,
    pub user_id: i64,
    pub status: IntentStatus,
    pub amount: Decimal,
    pub currency: Currency,
    pub provider_preference_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentIntent> for StatusSnapshot {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            external_reference: intent.external_reference,
            order_id: intent.order_id,
            user_id: intent.user_id,
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency,
            provider_preference_id: intent.provider_preference_id,
            provider_payment_id: intent.provider_payment_id,
            updated_at: intent.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}
