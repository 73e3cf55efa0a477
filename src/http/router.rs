use crate::http::handlers::{checkout, ops, status, webhook};
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let pagos = Router::new()
        .route("/checkout/preference", post(checkout::create_preference))
        .route("/webhook", post(webhook::receive))
        .route("/:external_reference/estado", get(status::get_status));

    Router::new()
        .route("/", get(ops::banner))
        .route("/health", get(ops::health))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .nest("/pagos", pagos)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
