use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid webhook signature")]
    SignatureInvalid,

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("payment provider error: {0}")]
    ProviderGateway(anyhow::Error),

    #[error("persistence error: {0}")]
    Persistence(anyhow::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::ProviderGateway(_) | ServiceError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::SignatureInvalid => "SIGNATURE_INVALID",
            ServiceError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServiceError::ProviderGateway(_) => "PROVIDER_GATEWAY_ERROR",
            ServiceError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        // Internal causes stay in the logs; clients get the category only.
        let message = match self {
            ServiceError::ProviderGateway(_) => "payment provider request failed".to_string(),
            ServiceError::Persistence(_) => "storage request failed".to_string(),
            other => other.to_string(),
        };
        ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message,
                details: None,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            ServiceError::ProviderGateway(e) | ServiceError::Persistence(e) => {
                tracing::error!("{}: {:#}", self.code(), e);
            }
            _ => {}
        }
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

pub(crate) fn persistence(e: anyhow::Error) -> ServiceError {
    ServiceError::Persistence(e)
}

pub(crate) fn provider(e: anyhow::Error) -> ServiceError {
    ServiceError::ProviderGateway(e)
}
