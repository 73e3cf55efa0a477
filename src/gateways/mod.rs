use crate::domain::payment::Currency;
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod mercadopago;
pub mod mock;

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub pending: String,
    pub failure: String,
}

#[derive(Debug, Clone)]
pub struct PreferenceRequest {
    pub external_reference: String,
    pub idempotency_key: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub payer_email: Option<String>,
    pub notification_url: String,
    pub back_urls: BackUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedPreference {
    pub id: Option<String>,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
}

/// Payment as reported by the provider. Kept alongside the raw document so
/// the audit trail stores exactly what was received.
#[derive(Debug, Clone)]
pub struct ProviderPayment {
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<Decimal>,
    pub raw: serde_json::Value,
}

impl ProviderPayment {
    pub fn from_json(raw: serde_json::Value) -> Self {
        let id = match raw.get("id") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let status = raw
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string();
        let external_reference = raw
            .get("external_reference")
            .and_then(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let transaction_amount = raw
            .get("transaction_amount")
            .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok());

        Self {
            id,
            status,
            external_reference,
            transaction_amount,
            raw,
        }
    }
}

#[async_trait::async_trait]
pub trait PaymentProviderGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_preference(&self, request: PreferenceRequest) -> Result<CreatedPreference>;

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment>;
}
