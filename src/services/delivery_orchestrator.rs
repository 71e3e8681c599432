//! services/delivery_orchestrator.rs
//! Máquina de estados de fallback para un par (anuncio, destinatario):
//! WhatsApp -> [confirmación] -> SMS -> [chequeo único] -> Email.
//!
//! Solo se pasa al siguiente canal cuando el anterior quedó confirmado como
//! no entregado o sin resultado concluyente. Email es el último recurso y su
//! resultado es definitivo.

use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    models::{
        announcement_model::{Announcement, OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, OrchestrationResult, ProviderHandle},
    },
    services::{
        audit_logger::{sanitize_response, AuditLogger},
        gateway::Gateways,
        status_poller::{is_confirmed, StatusPoller, STATUS_ERROR, STATUS_TIMEOUT},
    },
};

/// Estados que confirman un SMS en el chequeo único.
pub const SMS_CONFIRMED_STATUSES: [&str; 2] = ["delivered", "sent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfirmationOutcome {
    Confirmed,
    Failed,
    Timeout,
    Error,
    Unconfirmed,
}

/// Segundo registro de un canal rastreable. Timeout y error se distinguen
/// de un fallo explícito por `status`.
#[derive(Debug, Serialize)]
struct ConfirmationRecord<'a> {
    provider: Channel,
    message_id: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    info: &'a Value,
}

#[derive(Clone)]
pub struct DeliveryOrchestrator {
    gateways: Gateways,
    audit: AuditLogger,
    poller: StatusPoller,
}

impl DeliveryOrchestrator {
    pub fn new(gateways: Gateways, audit: AuditLogger, poller: StatusPoller) -> Self {
        Self {
            gateways,
            audit,
            poller,
        }
    }

    /// Corre el fallback completo. Siempre devuelve exactamente un resultado.
    pub async fn orchestrate(
        &self,
        announcement: &Announcement,
        recipient: &Recipient,
    ) -> OrchestrationResult {
        let message = OutboundMessage::from_announcement(announcement);
        log::info!(
            "(orchestrate) Iniciando announcement_id={} recipient_id={}",
            announcement.id,
            recipient.id
        );

        if recipient.whatsapp().is_some() {
            if let Some(done) = self.attempt_whatsapp(announcement, recipient, &message).await {
                return done;
            }
        } else {
            log::info!(
                "(orchestrate) recipient_id={} sin WhatsApp, se omite el canal.",
                recipient.id
            );
        }

        if recipient.sms().is_some() {
            if let Some(done) = self.attempt_sms(announcement, recipient, &message).await {
                return done;
            }
        } else {
            log::info!(
                "(orchestrate) recipient_id={} sin teléfono, se omite SMS.",
                recipient.id
            );
        }

        self.attempt_email(announcement, recipient, &message).await
    }

    async fn attempt_whatsapp(
        &self,
        announcement: &Announcement,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Option<OrchestrationResult> {
        let result = self
            .send(Channel::Whatsapp, announcement, recipient, message)
            .await;
        if !result.success {
            log::info!(
                "(attempt_whatsapp) recipient_id={} falló WhatsApp, pasando a SMS.",
                recipient.id
            );
            return None;
        }

        let message_id = match &result.handle {
            ProviderHandle::Trackable { message_id } => message_id,
            ProviderHandle::Mock | ProviderHandle::Immediate => {
                return Some(finish(recipient, Channel::Whatsapp, true, &result));
            }
        };

        let outcome = self
            .poller
            .await_confirmation(self.gateways.whatsapp.as_ref(), message_id)
            .await;
        let confirmed = outcome.is_final && is_confirmed(&outcome.status);
        let kind = if confirmed {
            ConfirmationOutcome::Confirmed
        } else if outcome.is_final {
            ConfirmationOutcome::Failed
        } else if outcome.status == STATUS_TIMEOUT {
            ConfirmationOutcome::Timeout
        } else {
            ConfirmationOutcome::Error
        };

        let record = ConfirmationRecord {
            provider: Channel::Whatsapp,
            message_id,
            status: &outcome.status,
            error_message: error_text(kind, &outcome.info),
            info: &outcome.info,
        };
        self.audit
            .record(
                &announcement.id,
                &recipient.id,
                Channel::Whatsapp,
                confirmed,
                &record,
            )
            .await;

        if confirmed {
            Some(finish(recipient, Channel::Whatsapp, true, &record))
        } else {
            log::info!(
                "(attempt_whatsapp) recipient_id={} confirmación {:?} ({}), pasando a SMS.",
                recipient.id,
                kind,
                outcome.status
            );
            None
        }
    }

    async fn attempt_sms(
        &self,
        announcement: &Announcement,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> Option<OrchestrationResult> {
        let result = self
            .send(Channel::Sms, announcement, recipient, message)
            .await;
        if !result.success {
            log::info!(
                "(attempt_sms) recipient_id={} falló SMS, pasando a Email.",
                recipient.id
            );
            return None;
        }

        let message_id = match &result.handle {
            ProviderHandle::Trackable { message_id } => message_id,
            ProviderHandle::Mock | ProviderHandle::Immediate => {
                return Some(finish(recipient, Channel::Sms, true, &result));
            }
        };

        // Un solo chequeo, sin ciclo de espera.
        let (status, info, kind) = match self.gateways.sms.fetch_status(message_id).await {
            Ok(report) if SMS_CONFIRMED_STATUSES.contains(&report.status.as_str()) => {
                (report.status, report.info, ConfirmationOutcome::Confirmed)
            }
            Ok(report) => (report.status, report.info, ConfirmationOutcome::Unconfirmed),
            Err(e) => {
                log::error!(
                    "(attempt_sms) Error consultando estado de {}: {:?}",
                    message_id,
                    e
                );
                (
                    STATUS_ERROR.to_string(),
                    json!(format!("{:#}", e)),
                    ConfirmationOutcome::Error,
                )
            }
        };
        let confirmed = kind == ConfirmationOutcome::Confirmed;

        let record = ConfirmationRecord {
            provider: Channel::Sms,
            message_id,
            status: &status,
            error_message: error_text(kind, &info),
            info: &info,
        };
        self.audit
            .record(&announcement.id, &recipient.id, Channel::Sms, confirmed, &record)
            .await;

        if confirmed {
            Some(finish(recipient, Channel::Sms, true, &record))
        } else {
            log::info!(
                "(attempt_sms) recipient_id={} SMS sin confirmar ({}), pasando a Email.",
                recipient.id,
                status
            );
            None
        }
    }

    async fn attempt_email(
        &self,
        announcement: &Announcement,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> OrchestrationResult {
        let result = self
            .send(Channel::Email, announcement, recipient, message)
            .await;
        if !result.success {
            log::warn!(
                "(attempt_email) recipient_id={} no se pudo notificar por ningún canal.",
                recipient.id
            );
        }
        finish(recipient, Channel::Email, result.success, &result)
    }

    /// Envía y registra el resultado inmediato. Los errores de transporte
    /// se convierten en un resultado fallido.
    async fn send(
        &self,
        channel: Channel,
        announcement: &Announcement,
        recipient: &Recipient,
        message: &OutboundMessage,
    ) -> ChannelResult {
        let gateway = self.gateways.for_channel(channel);
        let result = match gateway.send(recipient, message).await {
            Ok(result) => result,
            Err(e) => {
                log::error!(
                    "(send) Error de transporte en {} para recipient_id={}: {:?}",
                    channel,
                    recipient.id,
                    e
                );
                ChannelResult::failed(
                    channel,
                    STATUS_ERROR,
                    json!({ "error_message": format!("{:#}", e) }),
                )
            }
        };

        log::info!(
            "(send) {} recipient_id={} success={} status={:?}",
            channel,
            recipient.id,
            result.success,
            result.status
        );
        self.audit
            .record(&announcement.id, &recipient.id, channel, result.success, &result)
            .await;
        result
    }
}

fn finish<T: Serialize>(
    recipient: &Recipient,
    channel: Channel,
    success: bool,
    response: &T,
) -> OrchestrationResult {
    OrchestrationResult {
        recipient_id: recipient.id.clone(),
        channel,
        success,
        response: sanitize_response(response),
    }
}

fn error_text(kind: ConfirmationOutcome, info: &Value) -> Option<String> {
    match kind {
        ConfirmationOutcome::Error => info.as_str().map(str::to_string),
        _ => None,
    }
}
