//! services/audit_logger.rs
//! Sanitiza y persiste un registro inmutable por cada intento de entrega.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    models::delivery_model::{Channel, DeliveryAttempt},
    services::audit_store::AuditStore,
};

/// Campos que se conservan de una respuesta con id de mensaje del proveedor.
pub const ALLOWED_FIELDS: [&str; 7] = [
    "provider",
    "message_id",
    "status",
    "error_code",
    "error_message",
    "to",
    "from",
];

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Nunca falla: los errores del almacén se registran y se descartan.
    pub async fn record<T>(
        &self,
        announcement_id: &str,
        recipient_id: &str,
        channel: Channel,
        success: bool,
        response: &T,
    ) where
        T: Serialize + ?Sized,
    {
        let attempt = DeliveryAttempt {
            id: Uuid::new_v4().to_string(),
            announcement_id: announcement_id.to_string(),
            recipient_id: recipient_id.to_string(),
            channel,
            success,
            response: sanitize_response(response),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.append(&attempt).await {
            log::error!(
                "(record) No se pudo guardar el intento {} ({} / {} / {}): {:?}",
                attempt.id,
                announcement_id,
                recipient_id,
                channel,
                e
            );
        }
    }
}

/// Deja la respuesta en un formato apto para guardar.
///
/// Con `message_id` solo quedan los `ALLOWED_FIELDS` (buscados arriba y luego
/// dentro de `info`). Sin él se guarda la serialización completa, y si esta
/// falla un marcador con el motivo.
pub fn sanitize_response<T>(response: &T) -> Value
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(response) {
        Ok(value) if carries_message_id(&value) => allow_listed(&value),
        Ok(value) => value,
        Err(e) => {
            log::warn!("(sanitize_response) Respuesta no serializable: {}", e);
            json!({
                "sanitized": false,
                "error": "response_not_serializable",
                "detail": e.to_string(),
            })
        }
    }
}

fn carries_message_id(value: &Value) -> bool {
    value
        .get("message_id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty())
}

fn allow_listed(value: &Value) -> Value {
    let info = value.get("info").and_then(Value::as_object);
    let mut out = Map::new();

    for field in ALLOWED_FIELDS {
        let found = value
            .get(field)
            .filter(|v| !v.is_null())
            .or_else(|| info.and_then(|i| i.get(field)).filter(|v| !v.is_null()));
        if let Some(v) = found {
            out.insert(field.to_string(), v.clone());
        }
    }

    Value::Object(out)
}
