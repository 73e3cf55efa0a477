use crate::domain::payment::StatusSnapshot;
use crate::error::{persistence, ServiceError};
use crate::repo::PaymentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct StatusQuery {
    pub store: Arc<dyn PaymentStore>,
}

impl StatusQuery {
    pub async fn get_status(&self, external_reference: &str) -> Result<StatusSnapshot, ServiceError> {
        let external_reference = external_reference.trim();
        if external_reference.is_empty() {
            return Err(ServiceError::Validation("externalReference is required".to_string()));
        }

        self.store
            .find_by_external_reference(external_reference)
            .await
            .map_err(persistence)?
            .map(StatusSnapshot::from)
            .ok_or_else(|| ServiceError::NotFound("payment not found".to_string()))
    }
}
