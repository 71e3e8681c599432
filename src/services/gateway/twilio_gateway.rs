//! services/gateway/twilio_gateway.rs
//! WhatsApp y SMS vía la API REST de mensajes de Twilio.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    config::dispatch_config::{SmsProviderConfig, TwilioAccount, WhatsAppProviderConfig},
    models::{
        announcement_model::{OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, ProviderHandle, StatusReport},
    },
    services::{gateway::ChannelGateway, phone_normalizer::normalize_number},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Estados que Twilio devuelve al aceptar y que ya indican fallo.
const REJECTED_STATUSES: [&str; 2] = ["failed", "undelivered"];

#[derive(Clone)]
pub struct TwilioGateway {
    channel: Channel,
    http_client: Client,
    account: TwilioAccount,
    from: String,
    default_country_code: String,
}

impl TwilioGateway {
    pub fn whatsapp(
        http_client: Client,
        config: &WhatsAppProviderConfig,
        default_country_code: &str,
    ) -> Self {
        Self {
            channel: Channel::Whatsapp,
            http_client,
            account: config.account.clone(),
            from: with_whatsapp_prefix(&config.from),
            default_country_code: default_country_code.to_string(),
        }
    }

    pub fn sms(http_client: Client, config: &SmsProviderConfig, default_country_code: &str) -> Self {
        Self {
            channel: Channel::Sms,
            http_client,
            account: config.account.clone(),
            from: config.from.clone(),
            default_country_code: default_country_code.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.account.api_base.trim_end_matches('/'),
            self.account.account_sid
        )
    }

    fn message_url(&self, message_id: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages/{}.json",
            self.account.api_base.trim_end_matches('/'),
            self.account.account_sid,
            message_id
        )
    }

    /// Dirección destino ya normalizada, con prefijo `whatsapp:` si aplica.
    fn destination(&self, recipient: &Recipient) -> Option<String> {
        let raw = match self.channel {
            Channel::Whatsapp => recipient.whatsapp(),
            _ => recipient.sms(),
        }?;
        let number = normalize_number(raw, None, &self.default_country_code);
        if number.is_empty() {
            return None;
        }
        match self.channel {
            Channel::Whatsapp => Some(with_whatsapp_prefix(&number)),
            _ => Some(number),
        }
    }
}

#[async_trait]
impl ChannelGateway for TwilioGateway {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &Recipient, message: &OutboundMessage) -> Result<ChannelResult> {
        let Some(to) = self.destination(recipient) else {
            log::warn!(
                "(twilio_send) {} sin dirección para recipient_id={}",
                self.channel,
                recipient.id
            );
            return Ok(ChannelResult::failed(
                self.channel,
                "failed",
                json!({ "reason": "missing_recipient" }),
            ));
        };

        log::info!(
            "(twilio_send) {} -> to='{}', from='{}'",
            self.channel,
            to,
            self.from
        );

        let body = message.text();
        let form = [("To", to.as_str()), ("From", self.from.as_str()), ("Body", body.as_str())];
        let resp = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.account.account_sid, Some(&self.account.auth_token))
            .form(&form[..])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("(twilio_send) Fallo al POST de mensaje {}", self.channel))?;

        let http_status = resp.status();
        if !http_status.is_success() {
            // El cuerpo puede no ser JSON (p. ej. HTML de un proxy).
            let body_txt = resp.text().await.unwrap_or_default();
            log::error!(
                "(twilio_send) {} rechazado: status={} body={}",
                self.channel,
                http_status,
                body_txt
            );
            let payload: Value = serde_json::from_str(&body_txt).unwrap_or(Value::Null);
            let error_message = match payload.get("message") {
                Some(message) => message.clone(),
                None if body_txt.is_empty() => Value::Null,
                None => Value::String(body_txt),
            };
            return Ok(ChannelResult::failed(
                self.channel,
                "failed",
                json!({
                    "http_status": http_status.as_u16(),
                    "error_code": payload.get("code").cloned().unwrap_or(Value::Null),
                    "error_message": error_message,
                    "to": to,
                    "from": self.from,
                }),
            ));
        }

        let payload: Value = resp
            .json()
            .await
            .context("(twilio_send) Respuesta de Twilio no es JSON")?;

        Ok(channel_result_from_payload(self.channel, payload))
    }

    async fn fetch_status(&self, message_id: &str) -> Result<StatusReport> {
        let resp = self
            .http_client
            .get(self.message_url(message_id))
            .basic_auth(&self.account.account_sid, Some(&self.account.auth_token))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("(twilio_fetch_status) Fallo al GET de {}", message_id))?;

        let http_status = resp.status();
        if !http_status.is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Error consultando estado de {}: status={} body={}",
                message_id,
                http_status,
                body_txt
            ));
        }

        let payload: Value = resp
            .json()
            .await
            .context("(twilio_fetch_status) Respuesta de Twilio no es JSON")?;
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(StatusReport {
            status,
            info: payload,
        })
    }
}

/// Traduce el JSON de un mensaje aceptado por Twilio.
pub(crate) fn channel_result_from_payload(channel: Channel, payload: Value) -> ChannelResult {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string);
    let success = status
        .as_deref()
        .map(|s| !REJECTED_STATUSES.contains(&s))
        .unwrap_or(true);
    let handle = match payload.get("sid").and_then(Value::as_str) {
        Some(sid) if !sid.is_empty() => ProviderHandle::Trackable {
            message_id: sid.to_string(),
        },
        _ => ProviderHandle::Immediate,
    };

    ChannelResult {
        success,
        provider: channel,
        handle,
        status,
        info: payload,
    }
}

fn with_whatsapp_prefix(address: &str) -> String {
    if address.starts_with(WHATSAPP_PREFIX) {
        address.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, address)
    }
}
