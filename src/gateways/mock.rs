use crate::gateways::{CreatedPreference, PaymentProviderGateway, PreferenceRequest, ProviderPayment};
use anyhow::{anyhow, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process provider for local runs. A payment id of the form
/// `mock_pay_{external_reference}` resolves to that order, with the amount of
/// the last preference created for it.
pub struct MockGateway {
    pub behavior: String,
    amounts: Mutex<HashMap<String, String>>,
}

impl MockGateway {
    pub fn new(behavior: impl Into<String>) -> Self {
        Self {
            behavior: behavior.into(),
            amounts: Mutex::new(HashMap::new()),
        }
    }

    fn payment_status(&self) -> &'static str {
        match self.behavior.as_str() {
            "ALWAYS_PENDING" => "pending",
            "ALWAYS_REJECTED" => "rejected",
            _ => "approved",
        }
    }
}

#[async_trait::async_trait]
impl PaymentProviderGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_preference(&self, request: PreferenceRequest) -> Result<CreatedPreference> {
        if self.behavior == "ALWAYS_FAILURE" {
            return Err(anyhow!("mock provider declined preference"));
        }

        let amount = request
            .unit_price
            .checked_mul(rust_decimal::Decimal::from(request.quantity))
            .ok_or_else(|| anyhow!("amount for {} overflows", request.external_reference))?;
        if let Ok(mut amounts) = self.amounts.lock() {
            amounts.insert(request.external_reference.clone(), amount.to_string());
        }

        let id = format!("mock_pref_{}", uuid::Uuid::new_v4());
        Ok(CreatedPreference {
            init_point: Some(format!("https://mock.checkout.local/init/{}", id)),
            sandbox_init_point: Some(format!("https://sandbox.mock.checkout.local/init/{}", id)),
            id: Some(id),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment> {
        if self.behavior == "ALWAYS_FAILURE" {
            return Err(anyhow!("mock provider unavailable"));
        }

        let external_reference = payment_id.strip_prefix("mock_pay_").map(ToString::to_string);
        let amount = external_reference.as_ref().and_then(|r| {
            self.amounts
                .lock()
                .ok()
                .and_then(|amounts| amounts.get(r).cloned())
        });

        Ok(ProviderPayment::from_json(json!({
            "id": payment_id,
            "status": self.payment_status(),
            "external_reference": external_reference,
            "transaction_amount": amount,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Currency;
    use crate::gateways::BackUrls;
    use rust_decimal::Decimal;

    fn request(reference: &str) -> PreferenceRequest {
        PreferenceRequest {
            external_reference: reference.to_string(),
            idempotency_key: format!("{}-1", reference),
            title: "T".to_string(),
            quantity: 2,
            unit_price: Decimal::from(1000),
            currency: Currency::Cop,
            payer_email: None,
            notification_url: "http://localhost/pagos/webhook".to_string(),
            back_urls: BackUrls {
                success: "s".to_string(),
                pending: "p".to_string(),
                failure: "f".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn resolves_mock_payment_to_order() {
        let gw = MockGateway::new("ALWAYS_PENDING");
        let pref = gw.create_preference(request("O1")).await.unwrap();
        assert!(pref.id.unwrap().starts_with("mock_pref_"));

        let payment = gw.get_payment("mock_pay_O1").await.unwrap();
        assert_eq!(payment.status, "pending");
        assert_eq!(payment.external_reference.as_deref(), Some("O1"));
        assert_eq!(payment.transaction_amount, Some(Decimal::from(2000)));
    }

    #[tokio::test]
    async fn overflowing_amount_is_an_error() {
        let gw = MockGateway::new("ALWAYS_APPROVED");
        let mut req = request("O1");
        req.quantity = i64::MAX;
        req.unit_price = Decimal::MAX;
        assert!(gw.create_preference(req).await.is_err());
    }

    #[tokio::test]
    async fn failure_behavior_fails_both_calls() {
        let gw = MockGateway::new("ALWAYS_FAILURE");
        assert!(gw.create_preference(request("O1")).await.is_err());
        assert!(gw.get_payment("mock_pay_O1").await.is_err());
    }
}
