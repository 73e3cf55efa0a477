use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn get_status(
    State(state): State<AppState>,
    Path(external_reference): Path<String>,
) -> Response {
    match state.status_query.get_status(&external_reference).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => e.into_response(),
    }
}
