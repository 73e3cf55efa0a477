use crate::domain::payment::CreatePreferenceRequest;
use crate::error::ServiceError;
use crate::service::preference_service::PreferenceOutcome;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn create_preference(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreatePreferenceRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return ServiceError::Validation(rejection.body_text()).into_response(),
    };
    let header_key = headers
        .get("x-idempotency-key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    match state.preference_service.create_preference(req, header_key).await {
        Ok(PreferenceOutcome::Created(resp)) => (StatusCode::CREATED, Json(resp)).into_response(),
        Ok(PreferenceOutcome::AlreadyCreated(resp)) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}
