use crate::service::webhook_processor::{WebhookRequest, MAX_WEBHOOK_BODY};
use crate::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use std::collections::HashMap;

pub async fn receive(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    };
    let (body, truncated) = read_capped(body, MAX_WEBHOOK_BODY).await;
    let req = WebhookRequest {
        signature: header("x-signature"),
        request_id: header("x-request-id"),
        query,
        body,
        truncated,
    };

    match state.webhook_processor.handle(req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": outcome.message() })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Reads at most `limit` bytes. Oversized bodies are cut rather than refused
/// so the receipt still gets written.
async fn read_capped(body: Body, limit: usize) -> (Vec<u8>, bool) {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("webhook body read failed after {} bytes: {}", buf.len(), e);
                break;
            }
        };
        if buf.len() + chunk.len() > limit {
            buf.extend_from_slice(&chunk[..limit - buf.len()]);
            return (buf, true);
        }
        buf.extend_from_slice(&chunk);
    }
    (buf, false)
}
