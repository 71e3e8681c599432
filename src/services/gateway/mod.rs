//! services/gateway/mod.rs
//! Capacidad común de los canales: `send` + `fetch_status`.
//! Cada canal tiene una variante real y una simulada; se elige una sola vez
//! al construir `Gateways`, según la configuración presente.

pub mod mock_gateway;
pub mod smtp_gateway;
pub mod twilio_gateway;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::dispatch_config::DispatchConfig,
    models::{
        announcement_model::{OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, StatusReport},
    },
};

pub use mock_gateway::MockGateway;
pub use smtp_gateway::SmtpGateway;
pub use twilio_gateway::TwilioGateway;

/// Un `Err` en cualquiera de los dos métodos es un error de transporte.
/// Los rechazos del proveedor vuelven como `Ok` con `success = false`.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &Recipient, message: &OutboundMessage) -> Result<ChannelResult>;

    async fn fetch_status(&self, message_id: &str) -> Result<StatusReport>;
}

/// Los tres gateways, construidos una vez y compartidos entre todas las tareas.
#[derive(Clone)]
pub struct Gateways {
    pub whatsapp: Arc<dyn ChannelGateway>,
    pub sms: Arc<dyn ChannelGateway>,
    pub email: Arc<dyn ChannelGateway>,
}

impl Gateways {
    pub fn new(
        whatsapp: Arc<dyn ChannelGateway>,
        sms: Arc<dyn ChannelGateway>,
        email: Arc<dyn ChannelGateway>,
    ) -> Self {
        Self {
            whatsapp,
            sms,
            email,
        }
    }

    /// Los tres canales simulados con sus probabilidades por defecto.
    pub fn mocks() -> Self {
        Self::new(
            Arc::new(MockGateway::for_channel(Channel::Whatsapp)),
            Arc::new(MockGateway::for_channel(Channel::Sms)),
            Arc::new(MockGateway::for_channel(Channel::Email)),
        )
    }

    pub fn from_config(config: &DispatchConfig, http_client: Client) -> Result<Self> {
        let whatsapp: Arc<dyn ChannelGateway> = match &config.whatsapp {
            Some(cfg) => {
                log::info!("(from_config) WhatsApp -> Twilio (from={})", cfg.from);
                Arc::new(TwilioGateway::whatsapp(
                    http_client.clone(),
                    cfg,
                    &config.default_country_code,
                ))
            }
            None => {
                log::warn!("(from_config) WhatsApp sin configurar, usando mock.");
                Arc::new(MockGateway::for_channel(Channel::Whatsapp))
            }
        };

        let sms: Arc<dyn ChannelGateway> = match &config.sms {
            Some(cfg) => {
                log::info!("(from_config) SMS -> Twilio (from={})", cfg.from);
                Arc::new(TwilioGateway::sms(
                    http_client,
                    cfg,
                    &config.default_country_code,
                ))
            }
            None => {
                log::warn!("(from_config) SMS sin configurar, usando mock.");
                Arc::new(MockGateway::for_channel(Channel::Sms))
            }
        };

        let email: Arc<dyn ChannelGateway> = match &config.smtp {
            Some(cfg) => {
                log::info!(
                    "(from_config) Email -> SMTP host={}, port={}, from={}",
                    cfg.host,
                    cfg.port,
                    cfg.mail_from
                );
                Arc::new(SmtpGateway::new(cfg)?)
            }
            None => {
                log::warn!("(from_config) SMTP sin configurar, usando mock.");
                Arc::new(MockGateway::for_channel(Channel::Email))
            }
        };

        Ok(Self::new(whatsapp, sms, email))
    }

    pub fn for_channel(&self, channel: Channel) -> &Arc<dyn ChannelGateway> {
        match channel {
            Channel::Whatsapp => &self.whatsapp,
            Channel::Sms => &self.sms,
            Channel::Email => &self.email,
        }
    }
}
