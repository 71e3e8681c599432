use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    models::{
        announcement_model::{OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, ProviderHandle, StatusReport},
    },
    services::gateway::ChannelGateway,
};

/// Gateway simulado: éxito con probabilidad fija, sin red.
#[derive(Debug, Clone)]
pub struct MockGateway {
    channel: Channel,
    success_probability: f64,
    latency: Option<Duration>,
}

impl MockGateway {
    /// WhatsApp 0.8, SMS 0.9, Email 0.95
    pub fn for_channel(channel: Channel) -> Self {
        let success_probability = match channel {
            Channel::Whatsapp => 0.8,
            Channel::Sms => 0.9,
            Channel::Email => 0.95,
        };
        Self {
            channel,
            success_probability,
            latency: None,
        }
    }

    pub fn with_success_probability(mut self, probability: f64) -> Self {
        self.success_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Demora artificial antes de responder cada envío.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

#[async_trait]
impl ChannelGateway for MockGateway {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &Recipient, _message: &OutboundMessage) -> Result<ChannelResult> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.channel == Channel::Email && recipient.email().is_none() {
            return Ok(ChannelResult::failed(
                self.channel,
                "failed",
                json!({ "reason": "missing_recipient" }),
            ));
        }

        let success = rand::random::<f64>() < self.success_probability;
        let status = if success { "sent" } else { "failed" };
        log::info!(
            "(mock_send) {} -> recipient_id={} success={}",
            self.channel,
            recipient.id,
            success
        );

        Ok(ChannelResult {
            success,
            provider: self.channel,
            handle: ProviderHandle::Mock,
            status: Some(status.to_string()),
            info: json!(status),
        })
    }

    async fn fetch_status(&self, message_id: &str) -> Result<StatusReport> {
        bail!(
            "El gateway simulado de {} no rastrea mensajes (message_id={})",
            self.channel,
            message_id
        )
    }
}
