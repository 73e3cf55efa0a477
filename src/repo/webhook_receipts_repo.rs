use crate::domain::webhook::WebhookReceipt;
use anyhow::Result;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct WebhookReceiptsRepo {
    pub pool: PgPool,
}

impl WebhookReceiptsRepo {
    pub async fn insert(&self, receipt: &WebhookReceipt) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO webhook_receipts (topic, provider_resource_id, request_id, signature_valid, raw_body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&receipt.topic)
        .bind(&receipt.provider_resource_id)
        .bind(&receipt.request_id)
        .bind(receipt.signature_valid)
        .bind(&receipt.raw_body)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }
}
