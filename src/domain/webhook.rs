use crate::domain::payment::IntentStatus;
use crate::events::routing_keys;
use serde::Serialize;
use std::collections::HashMap;

pub const PAYMENT_TOPIC: &str = "payment";

#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub topic: String,
    pub provider_resource_id: Option<String>,
    pub request_id: Option<String>,
    pub signature_valid: bool,
    pub raw_body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentEventRecord {
    pub external_reference: String,
    pub event_type: String,
    pub payload_json: serde_json::Value,
}

/// Topic and resource id of an inbound notification. The provider sends them
/// in the body for webhooks and in the query string for legacy IPN calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub topic: String,
    pub data_id: Option<String>,
}

pub fn extract_target(body: &serde_json::Value, query: &HashMap<String, String>) -> WebhookTarget {
    let topic = str_field(body, &["type"])
        .or_else(|| str_field(body, &["topic"]))
        .or_else(|| query.get("topic").cloned())
        .unwrap_or_else(|| "unknown".to_string());

    let data_id = str_field(body, &["data", "id"])
        .or_else(|| str_field(body, &["id"]))
        .or_else(|| query.get("data.id").cloned());

    WebhookTarget { topic, data_id }
}

/// Resource id that participates in the signed manifest: the query value
/// takes precedence over the body.
pub fn signed_data_id(body: &serde_json::Value, query: &HashMap<String, String>) -> Option<String> {
    query
        .get("data.id")
        .filter(|v| !v.is_empty())
        .cloned()
        .or_else(|| str_field(body, &["data", "id"]))
}

fn str_field(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    match cur {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn map_provider_status(provider_status: &str) -> (IntentStatus, &'static str) {
    match provider_status {
        "approved" => (IntentStatus::Approved, routing_keys::PAGO_APROBADO),
        "pending" | "in_process" => (IntentStatus::Pending, routing_keys::PAGO_PENDIENTE),
        _ => (IntentStatus::Rejected, routing_keys::PAGO_RECHAZADO),
    }
}

pub fn event_type_for(provider_status: &str) -> String {
    format!("provider.{}", provider_status)
}
