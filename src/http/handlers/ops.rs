use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

pub async fn banner() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "payments service")
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.store.ping().await.is_ok();
    let broker_ok = state.publisher.is_connected().await;

    let ready = db_ok && broker_ok;
    let status = if ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "db": db_ok,
            "broker": broker_ok
        })),
    )
        .into_response()
}

/// Never touches the database or broker; a stuck dependency must not get
/// the process restarted.
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "alive": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
