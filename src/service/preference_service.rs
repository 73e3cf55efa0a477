use crate::domain::payment::{
    CreatePreferenceRequest, Currency, IntentStatus, NewPaymentIntent, PaymentIntent, PreferenceResponse,
};
use crate::error::{persistence, provider, ServiceError};
use crate::gateways::{BackUrls, PaymentProviderGateway, PreferenceRequest};
use crate::repo::PaymentStore;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub notification_url: String,
    pub back_urls: BackUrls,
}

#[derive(Debug, Clone)]
pub enum PreferenceOutcome {
    Created(PreferenceResponse),
    AlreadyCreated(PreferenceResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPreference {
    pub order_id: String,
    pub user_id: i64,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub email: Option<String>,
    pub external_reference: String,
    pub idempotency_key: String,
    pub amount: Decimal,
}

/// Largest value `payment_intents.amount NUMERIC(14,2)` can hold.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

#[derive(Clone)]
pub struct PreferenceService {
    pub store: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentProviderGateway>,
    pub checkout: CheckoutSettings,
}

impl PreferenceService {
    pub async fn create_preference(
        &self,
        req: CreatePreferenceRequest,
        header_idempotency_key: Option<String>,
    ) -> Result<PreferenceOutcome, ServiceError> {
        let valid = validate_request(req, header_idempotency_key)?;

        if let Some(found) = self
            .store
            .find_by_idempotency_key(&valid.idempotency_key)
            .await
            .map_err(persistence)?
        {
            if found.has_checkout_url() {
                tracing::info!(
                    "preference for idempotency key {} already exists ({})",
                    valid.idempotency_key,
                    found.external_reference
                );
                return Ok(PreferenceOutcome::AlreadyCreated(stored_response(
                    found,
                    "preference already created",
                )));
            }
        }

        if let Some(found) = self
            .store
            .find_by_external_reference(&valid.external_reference)
            .await
            .map_err(persistence)?
        {
            if found.has_checkout_url() {
                tracing::info!("order {} already has a preference", valid.external_reference);
                return Ok(PreferenceOutcome::AlreadyCreated(stored_response(
                    found,
                    "order already has a preference",
                )));
            }
        }

        let created = self
            .gateway
            .create_preference(PreferenceRequest {
                external_reference: valid.external_reference.clone(),
                idempotency_key: valid.idempotency_key.clone(),
                title: valid.title.clone(),
                quantity: valid.quantity,
                unit_price: valid.unit_price,
                currency: valid.currency,
                payer_email: valid.email.clone(),
                notification_url: self.checkout.notification_url.clone(),
                back_urls: self.checkout.back_urls.clone(),
            })
            .await
            .map_err(provider)?;

        let outcome = self
            .store
            .upsert_intent(NewPaymentIntent {
                amount: valid.amount,
                order_id: valid.order_id,
                user_id: valid.user_id,
                external_reference: valid.external_reference,
                idempotency_key: valid.idempotency_key,
                currency: valid.currency,
                status: IntentStatus::PreferenceCreated,
                provider_preference_id: created.id,
                provider_payment_id: None,
                init_point: created.init_point,
                sandbox_init_point: created.sandbox_init_point,
            })
            .await
            .map_err(persistence)?;

        if !outcome.written {
            tracing::warn!(
                "concurrent request stored the preference for {} first; returning it",
                outcome.intent.external_reference
            );
            return Ok(PreferenceOutcome::AlreadyCreated(stored_response(
                outcome.intent,
                "preference already created",
            )));
        }

        tracing::info!(
            "created {} preference {:?} for {} (amount {} {})",
            self.gateway.name(),
            outcome.intent.provider_preference_id,
            outcome.intent.external_reference,
            outcome.intent.amount,
            outcome.intent.currency
        );

        let intent = outcome.intent;
        Ok(PreferenceOutcome::Created(PreferenceResponse {
            message: None,
            external_reference: intent.external_reference,
            preference_id: intent.provider_preference_id,
            init_point: intent.init_point,
            sandbox_init_point: intent.sandbox_init_point,
            status: None,
        }))
    }
}

pub fn validate_request(
    req: CreatePreferenceRequest,
    header_idempotency_key: Option<String>,
) -> Result<ValidatedPreference, ServiceError> {
    let order_id = non_empty(req.order_id);
    let title = non_empty(req.title);

    let mut missing = Vec::new();
    if order_id.is_none() {
        missing.push("orderId");
    }
    if req.user_id.is_none() {
        missing.push("userId");
    }
    if title.is_none() {
        missing.push("title");
    }
    if req.quantity.is_none() {
        missing.push("quantity");
    }
    if req.unit_price.is_none() {
        missing.push("unitPrice");
    }
    if req.currency.is_none() {
        missing.push("currency");
    }

    let (Some(order_id), Some(user_id), Some(title), Some(quantity), Some(unit_price), Some(currency)) =
        (order_id, req.user_id, title, req.quantity, req.unit_price, req.currency)
    else {
        return Err(ServiceError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    };

    if user_id <= 0 {
        return Err(ServiceError::Validation("userId must be positive".to_string()));
    }
    if quantity <= 0 || unit_price <= Decimal::ZERO {
        return Err(ServiceError::Validation(
            "quantity and unitPrice must be greater than zero".to_string(),
        ));
    }
    let amount = unit_price
        .checked_mul(Decimal::from(quantity))
        .filter(|amount| *amount <= MAX_AMOUNT)
        .ok_or_else(|| {
            ServiceError::Validation(format!("quantity x unitPrice must not exceed {}", MAX_AMOUNT))
        })?;
    let currency: Currency = currency
        .trim()
        .parse()
        .map_err(|_| ServiceError::Validation(format!("unsupported currency {:?}", currency)))?;

    let external_reference = order_id.clone();
    let idempotency_key = non_empty(req.idempotency_key)
        .or_else(|| non_empty(header_idempotency_key))
        .unwrap_or_else(|| format!("{}-{}", order_id, user_id));

    Ok(ValidatedPreference {
        order_id,
        user_id,
        title,
        quantity,
        unit_price,
        currency,
        email: non_empty(req.email),
        external_reference,
        idempotency_key,
        amount,
    })
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn stored_response(intent: PaymentIntent, message: &str) -> PreferenceResponse {
    PreferenceResponse {
        message: Some(message.to_string()),
        external_reference: intent.external_reference,
        preference_id: intent.provider_preference_id,
        init_point: intent.init_point,
        sandbox_init_point: intent.sandbox_init_point,
        status: Some(intent.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreatePreferenceRequest {
        CreatePreferenceRequest {
            order_id: Some(" O1 ".to_string()),
            user_id: Some(7),
            title: Some("T".to_string()),
            quantity: Some(2),
            unit_price: Some(Decimal::from(1000)),
            currency: Some("COP".to_string()),
            email: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn derives_reference_key_and_amount() {
        let v = validate_request(request(), None).unwrap();
        assert_eq!(v.external_reference, "O1");
        assert_eq!(v.idempotency_key, "O1-7");
        assert_eq!(v.amount, Decimal::from(2000));
        assert_eq!(v.currency, Currency::Cop);
    }

    #[test]
    fn body_key_wins_over_header() {
        let mut req = request();
        req.idempotency_key = Some("body-key".to_string());
        let v = validate_request(req, Some("header-key".to_string())).unwrap();
        assert_eq!(v.idempotency_key, "body-key");

        let v = validate_request(request(), Some("header-key".to_string())).unwrap();
        assert_eq!(v.idempotency_key, "header-key");
    }

    #[test]
    fn reports_missing_fields() {
        let mut req = request();
        req.title = Some("   ".to_string());
        req.currency = None;
        match validate_request(req, None) {
            Err(ServiceError::Validation(msg)) => {
                assert!(msg.contains("title"));
                assert!(msg.contains("currency"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_amounts_that_overflow_or_exceed_storage() {
        let mut req = request();
        req.quantity = Some(10_000_000_000);
        req.unit_price = Some(Decimal::from_str_exact("100000000000000000000").unwrap());
        assert!(matches!(validate_request(req, None), Err(ServiceError::Validation(_))));

        let mut req = request();
        req.quantity = Some(1);
        req.unit_price = Some(Decimal::from(1_000_000_000_000i64));
        assert!(matches!(validate_request(req, None), Err(ServiceError::Validation(_))));

        let mut req = request();
        req.quantity = Some(1);
        req.unit_price = Some(MAX_AMOUNT);
        assert_eq!(validate_request(req, None).unwrap().amount, MAX_AMOUNT);
    }

    #[test]
    fn max_amount_matches_column_precision() {
        assert_eq!(MAX_AMOUNT.to_string(), "999999999999.99");
    }

    #[test]
    fn rejects_non_positive_amounts_and_unknown_currency() {
        let mut req = request();
        req.quantity = Some(0);
        assert!(matches!(validate_request(req, None), Err(ServiceError::Validation(_))));

        let mut req = request();
        req.unit_price = Some(Decimal::from(-5));
        assert!(matches!(validate_request(req, None), Err(ServiceError::Validation(_))));

        let mut req = request();
        req.currency = Some("USD".to_string());
        assert!(matches!(validate_request(req, None), Err(ServiceError::Validation(_))));
    }
}
