use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canales soportados, en orden de preferencia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Sms,
    Email,
}

impl Channel {
    /// Orden fijo de fallback.
    pub const FALLBACK_ORDER: [Channel; 3] = [Channel::Whatsapp, Channel::Sms, Channel::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(Channel::Whatsapp),
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            other => Err(anyhow!("Canal desconocido: {}", other)),
        }
    }
}

/// Cómo respondió el proveedor. El orquestador decide sobre esta etiqueta,
/// nunca inspeccionando campos sueltos de la respuesta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "handle", rename_all = "snake_case")]
pub enum ProviderHandle {
    /// Resultado simulado, sin proveedor real.
    Mock,
    /// El proveedor respondió pero no entrega un id consultable.
    Immediate,
    /// El proveedor aceptó el mensaje y su estado se puede consultar después.
    Trackable { message_id: String },
}

/// Resultado de una llamada a `send` de un gateway. Nunca se persiste tal cual.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub success: bool,
    pub provider: Channel,
    #[serde(flatten)]
    pub handle: ProviderHandle,
    pub status: Option<String>,
    pub info: Value,
}

impl ChannelResult {
    pub fn message_id(&self) -> Option<&str> {
        match &self.handle {
            ProviderHandle::Trackable { message_id } => Some(message_id),
            _ => None,
        }
    }

    /// Fallo sin id de mensaje (error de transporte, dirección inválida...).
    pub fn failed(provider: Channel, status: &str, info: Value) -> Self {
        Self {
            success: false,
            provider,
            handle: ProviderHandle::Immediate,
            status: Some(status.to_string()),
            info,
        }
    }
}

/// Estado reportado por el proveedor para un mensaje ya aceptado.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub info: Value,
}

/// Resultado del poller de confirmación.
#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    #[serde(rename = "final")]
    pub is_final: bool,
    pub status: String,
    pub info: Value,
}

/// Registro de auditoría: un intento de entrega. Solo se agrega, nunca se modifica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: String,
    pub announcement_id: String,
    pub recipient_id: String,
    pub channel: Channel,
    pub success: bool,
    pub response: Value,
    pub timestamp: DateTime<Utc>,
}

/// Resultado final de la orquestación para un destinatario.
/// Refleja siempre el último canal intentado.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub recipient_id: String,
    pub channel: Channel,
    pub success: bool,
    pub response: Value,
}
