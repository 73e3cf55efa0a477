use crate::domain::webhook::PaymentEventRecord;
use anyhow::Result;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct PaymentEventsRepo {
    pub pool: PgPool,
}

impl PaymentEventsRepo {
    pub async fn insert(&self, event: &PaymentEventRecord) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO payment_events (external_reference, event_type, payload_json)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&event.external_reference)
        .bind(&event.event_type)
        .bind(&event.payload_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }
}
