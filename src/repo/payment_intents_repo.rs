use crate::domain::payment::{IntentPatch, NewPaymentIntent, PatchOutcome, PaymentIntent, UpsertOutcome};
use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const INTENT_COLUMNS: &str = "order_id, user_id, external_reference, idempotency_key, amount, currency, status, \
     provider_preference_id, provider_payment_id, init_point, sandbox_init_point, created_at, updated_at";

#[derive(Clone)]
pub struct PaymentIntentsRepo {
    pub pool: PgPool,
}

impl PaymentIntentsRepo {
    pub async fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<PaymentIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_intents WHERE idempotency_key = $1",
            INTENT_COLUMNS
        ))
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_intent).transpose()
    }

    pub async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<PaymentIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_intents WHERE external_reference = $1",
            INTENT_COLUMNS
        ))
        .bind(external_reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_intent).transpose()
    }

    /// Insert-or-update keyed on `external_reference`. A stored row that
    /// already carries a checkout URL is left untouched and returned with
    /// `written = false`; the same happens when the insert collides on
    /// `idempotency_key`.
    pub async fn upsert(&self, data: &NewPaymentIntent) -> Result<UpsertOutcome> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO payment_intents (
                order_id, user_id, external_reference, idempotency_key, amount, currency, status,
                provider_preference_id, provider_payment_id, init_point, sandbox_init_point
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (external_reference) DO UPDATE SET
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                provider_preference_id = EXCLUDED.provider_preference_id,
                provider_payment_id = COALESCE(EXCLUDED.provider_payment_id, payment_intents.provider_payment_id),
                init_point = EXCLUDED.init_point,
                sandbox_init_point = EXCLUDED.sandbox_init_point,
                updated_at = now()
            WHERE payment_intents.init_point IS NULL
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(&data.order_id)
        .bind(data.user_id)
        .bind(&data.external_reference)
        .bind(&data.idempotency_key)
        .bind(data.amount)
        .bind(data.currency.as_ref())
        .bind(data.status.as_ref())
        .bind(&data.provider_preference_id)
        .bind(&data.provider_payment_id)
        .bind(&data.init_point)
        .bind(&data.sandbox_init_point)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(UpsertOutcome {
                intent: map_intent(&row)?,
                written: true,
            }),
            Ok(None) => {
                let existing = self
                    .find_by_external_reference(&data.external_reference)
                    .await?
                    .ok_or_else(|| anyhow!("intent {} vanished during upsert", data.external_reference))?;
                Ok(UpsertOutcome {
                    intent: existing,
                    written: false,
                })
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let existing = self
                    .find_by_idempotency_key(&data.idempotency_key)
                    .await?
                    .ok_or_else(|| anyhow!("idempotency key {} conflicted but no row found", data.idempotency_key))?;
                Ok(UpsertOutcome {
                    intent: existing,
                    written: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn apply_patch(&self, external_reference: &str, patch: &IntentPatch) -> Result<PatchOutcome> {
        let allowed_from: Option<Vec<String>> = patch.status.map(|next| {
            next.overwritable_from()
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect()
        });

        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_intents
            SET status = COALESCE($2, status),
                provider_payment_id = COALESCE($3, provider_payment_id),
                updated_at = now()
            WHERE external_reference = $1
              AND ($4::text[] IS NULL OR status = ANY($4))
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(external_reference)
        .bind(patch.status.map(|s| s.as_ref().to_string()))
        .bind(&patch.provider_payment_id)
        .bind(allowed_from)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(PatchOutcome::Applied(map_intent(&row)?));
        }

        Ok(match self.find_by_external_reference(external_reference).await? {
            Some(current) => PatchOutcome::Stale(current),
            None => PatchOutcome::NotFound,
        })
    }
}

fn map_intent(r: &PgRow) -> Result<PaymentIntent> {
    Ok(PaymentIntent {
        order_id: r.try_get("order_id")?,
        user_id: r.try_get("user_id")?,
        external_reference: r.try_get("external_reference")?,
        idempotency_key: r.try_get("idempotency_key")?,
        amount: r.try_get("amount")?,
        currency: r.try_get::<String, _>("currency")?.parse()?,
        status: r.try_get::<String, _>("status")?.parse()?,
        provider_preference_id: r.try_get("provider_preference_id")?,
        provider_payment_id: r.try_get("provider_payment_id")?,
        init_point: r.try_get("init_point")?,
        sandbox_init_point: r.try_get("sandbox_init_point")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}
