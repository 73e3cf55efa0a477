use crate::gateways::{CreatedPreference, PaymentProviderGateway, PreferenceRequest, ProviderPayment};
use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

pub struct MercadoPagoGateway {
    pub base_url: String,
    pub access_token: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl MercadoPagoGateway {
    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[async_trait::async_trait]
impl PaymentProviderGateway for MercadoPagoGateway {
    fn name(&self) -> &'static str {
        "mercadopago"
    }

    async fn create_preference(&self, request: PreferenceRequest) -> Result<CreatedPreference> {
        let url = format!("{}/checkout/preferences", self.base_url);
        let unit_price = request
            .unit_price
            .to_f64()
            .ok_or_else(|| anyhow!("unit price {} is not representable", request.unit_price))?;

        let mut body = json!({
            "items": [{
                "id": request.external_reference,
                "title": request.title,
                "quantity": request.quantity,
                "unit_price": unit_price,
                "currency_id": request.currency.as_ref(),
            }],
            "external_reference": request.external_reference,
            "notification_url": request.notification_url,
            "back_urls": request.back_urls,
            "auto_return": "approved",
        });
        if let Some(email) = &request.payer_email {
            body["payer"] = json!({ "email": email });
        }

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .context("create preference request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "create preference returned HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }

        resp.json::<CreatedPreference>()
            .await
            .context("invalid create preference response")
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment> {
        // The id comes from an inbound notification; keep it to a single path segment.
        if payment_id.is_empty()
            || !payment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!("refusing malformed payment id {:?}", payment_id));
        }

        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout())
            .send()
            .await
            .with_context(|| format!("get payment {} request failed", payment_id))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "get payment {} returned HTTP {}: {}",
                payment_id,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("invalid payment {} response", payment_id))?;
        Ok(ProviderPayment::from_json(raw))
    }
}
