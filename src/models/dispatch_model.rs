use serde::{Deserialize, Serialize};

use crate::models::{
    announcement_model::{Announcement, Recipient},
    delivery_model::OrchestrationResult,
};

/// Request para despachar un anuncio
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRequest {
    pub announcement: Announcement,
    #[serde(default)]
    pub recipients: Vec<Recipient>,

    /// Si es true se responde sin esperar el despacho
    #[serde(default)]
    pub async_send: bool,
}

/// Resultado de un despacho completo
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    NoRecipients {
        notice: String,
    },
    Completed {
        results: Vec<OrchestrationResult>,
    },
    /// Se dejó de esperar; los envíos pendientes siguen corriendo.
    DeadlineExceeded {
        results: Vec<OrchestrationResult>,
        pending: Vec<String>,
    },
}

impl DispatchOutcome {
    pub fn results(&self) -> &[OrchestrationResult] {
        match self {
            DispatchOutcome::NoRecipients { .. } => &[],
            DispatchOutcome::Completed { results } => results,
            DispatchOutcome::DeadlineExceeded { results, .. } => results,
        }
    }
}

/// Respuesta genérica
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub announcement_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DispatchOutcome>,
}
