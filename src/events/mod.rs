pub mod broker;
pub mod consumer;

pub mod routing_keys {
    pub const PAGO_APROBADO: &str = "pago.aprobado";
    pub const PAGO_PENDIENTE: &str = "pago.pendiente";
    pub const PAGO_RECHAZADO: &str = "pago.rechazado";

    // Produced and consumed by collaborating services on the same exchange.
    pub const PERSONALIZACION_CONFIRMADA: &str = "personalizacion.confirmada";
    pub const TRANSACCION_COMPLETADA: &str = "transaccion.completada";
    pub const TRANSACCION_USUARIO_ACTUALIZAR: &str = "transaccion.usuario.actualizar";

    /// Binding pattern matching every payment outcome published here.
    pub const PAGO_ALL: &str = "pago.#";
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker channel is not open")]
    ChannelUnavailable,

    #[error("could not encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker rejected publish: {0}")]
    Broker(#[from] lapin::Error),
}

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one message. Fails immediately when no channel is open; the
    /// message is not buffered.
    async fn publish(&self, routing_key: &str, payload: serde_json::Value) -> Result<(), PublishError>;

    async fn is_connected(&self) -> bool;
}

/// Adds the publish timestamp. Non-object payloads are wrapped.
pub fn stamp(payload: serde_json::Value, now: chrono::DateTime<chrono::Utc>) -> serde_json::Value {
    let timestamp = serde_json::Value::String(now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    match payload {
        serde_json::Value::Object(mut map) => {
            map.insert("timestamp".to_string(), timestamp);
            serde_json::Value::Object(map)
        }
        other => serde_json::json!({ "payload": other, "timestamp": timestamp }),
    }
}
