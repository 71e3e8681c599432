//! services/gateway/smtp_gateway.rs

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;

use crate::{
    config::dispatch_config::SmtpConfig,
    models::{
        announcement_model::{OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, ProviderHandle, StatusReport},
    },
    services::gateway::ChannelGateway,
};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SmtpGateway {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpGateway {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .context("MAIL_FROM inválido")?;

        let tls_params = TlsParameters::new(config.host.clone())?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .tls(Tls::Required(tls_params))
            .build();

        Ok(Self { mailer, from })
    }

    fn build_message(&self, to: Mailbox, message: &OutboundMessage) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("No se pudo armar el correo")
    }
}

#[async_trait]
impl ChannelGateway for SmtpGateway {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &Recipient, message: &OutboundMessage) -> Result<ChannelResult> {
        let Some(address) = recipient.email() else {
            log::warn!(
                "(smtp_send) recipient_id={} no tiene email.",
                recipient.id
            );
            return Ok(ChannelResult::failed(
                Channel::Email,
                "failed",
                json!({ "reason": "missing_recipient" }),
            ));
        };

        let to = match address.parse::<lettre::Address>() {
            Ok(addr) => Mailbox::new(recipient.name.clone(), addr),
            Err(e) => {
                log::warn!("(smtp_send) Email inválido '{}': {}", address, e);
                return Ok(ChannelResult::failed(
                    Channel::Email,
                    "failed",
                    json!({ "reason": "invalid_recipient", "to": address }),
                ));
            }
        };

        let email = self.build_message(to, message)?;
        log::info!("(smtp_send) Enviando correo a '{}'", address);

        let response = tokio::time::timeout(SEND_TIMEOUT, self.mailer.send(email))
            .await
            .context("(smtp_send) Timeout enviando correo")?
            .context("(smtp_send) Fallo en transporte SMTP")?;

        Ok(ChannelResult {
            success: response.is_positive(),
            provider: Channel::Email,
            handle: ProviderHandle::Immediate,
            status: Some(if response.is_positive() { "sent" } else { "failed" }.to_string()),
            info: json!({
                "to": address,
                "from": self.from.email.to_string(),
                "smtp_code": response.code().to_string(),
            }),
        })
    }

    async fn fetch_status(&self, message_id: &str) -> Result<StatusReport> {
        anyhow::bail!("SMTP no permite consultar estado (message_id={})", message_id)
    }
}
