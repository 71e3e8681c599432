//! tests/support.rs
//! Gateways guionados y helpers comunes para los tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    config::dispatch_config::PollSettings,
    models::{
        announcement_model::{Announcement, OutboundMessage, Recipient},
        delivery_model::{Channel, ChannelResult, ProviderHandle, StatusReport},
    },
    services::{
        audit_logger::AuditLogger,
        audit_store::{AuditStore, InMemoryAuditStore},
        delivery_orchestrator::DeliveryOrchestrator,
        gateway::{ChannelGateway, Gateways, MockGateway},
        status_poller::StatusPoller,
    },
};

/// Respuesta de `send` que el gateway guionado devuelve siempre.
#[derive(Clone)]
pub enum ScriptedSend {
    Trackable(&'static str),
    Rejected,
    TransportError,
}

/// Gateway con estados predefinidos para `fetch_status`.
/// Cuando se acaba la cola repite el último estado.
pub struct ScriptedGateway {
    channel: Channel,
    send: ScriptedSend,
    statuses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    pub sends: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(channel: Channel, send: ScriptedSend) -> Self {
        Self {
            channel,
            send,
            statuses: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            sends: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        {
            let mut queue = self.statuses.lock().unwrap();
            queue.extend(statuses.iter().map(|s| Ok(s.to_string())));
        }
        self
    }

    pub fn with_status_error(self, detail: &str) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(detail.to_string()));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelGateway for ScriptedGateway {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &Recipient, _message: &OutboundMessage) -> Result<ChannelResult> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        match &self.send {
            ScriptedSend::Trackable(sid) => Ok(ChannelResult {
                success: true,
                provider: self.channel,
                handle: ProviderHandle::Trackable {
                    message_id: sid.to_string(),
                },
                status: Some("queued".to_string()),
                info: json!({
                    "sid": sid,
                    "status": "queued",
                    "to": recipient.whatsapp_address,
                    "from": "whatsapp:+14155238886",
                    "account_sid": "AC-secret",
                    "body": "no debería persistirse",
                }),
            }),
            ScriptedSend::Rejected => Ok(ChannelResult::failed(
                self.channel,
                "failed",
                json!({ "error_code": 21211, "error_message": "invalid 'To'" }),
            )),
            ScriptedSend::TransportError => Err(anyhow!("connection reset by peer")),
        }
    }

    async fn fetch_status(&self, message_id: &str) -> Result<StatusReport> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut queue = self.statuses.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(item) = queue.pop_front() {
                *last = Some(item.clone());
                Some(item)
            } else {
                last.clone()
            }
        };
        match next {
            Some(Ok(status)) => Ok(StatusReport {
                info: json!({ "sid": message_id, "status": status }),
                status,
            }),
            Some(Err(detail)) => Err(anyhow!(detail)),
            None => Err(anyhow!("sin estados guionados")),
        }
    }
}

pub fn always(channel: Channel) -> Arc<dyn ChannelGateway> {
    Arc::new(MockGateway::for_channel(channel).with_success_probability(1.0))
}

pub fn never(channel: Channel) -> Arc<dyn ChannelGateway> {
    Arc::new(MockGateway::for_channel(channel).with_success_probability(0.0))
}

pub fn fast_poll() -> PollSettings {
    PollSettings {
        timeout: Duration::from_millis(60),
        interval: Duration::from_millis(10),
    }
}

pub fn announcement() -> Announcement {
    Announcement {
        id: "ann-1".to_string(),
        title: "Reunión general".to_string(),
        body: "El viernes a las 18:00 en la sede.".to_string(),
    }
}

pub fn recipient(id: &str) -> Recipient {
    Recipient {
        id: id.to_string(),
        name: Some("Asha".to_string()),
        whatsapp_address: Some("8869965959".to_string()),
        phone_address: Some("+91 88699 65959".to_string()),
        email_address: Some("asha@example.com".to_string()),
    }
}

pub struct Harness {
    pub store: Arc<InMemoryAuditStore>,
    pub orchestrator: DeliveryOrchestrator,
}

pub fn harness(gateways: Gateways, poll: PollSettings) -> Harness {
    let store = Arc::new(InMemoryAuditStore::new());
    let audit = AuditLogger::new(store.clone() as Arc<dyn AuditStore>);
    Harness {
        store,
        orchestrator: DeliveryOrchestrator::new(gateways, audit, StatusPoller::new(poll)),
    }
}

/// Almacén que siempre falla al escribir.
pub struct BrokenAuditStore;

#[async_trait]
impl AuditStore for BrokenAuditStore {
    async fn append(&self, _attempt: &crate::models::delivery_model::DeliveryAttempt) -> Result<()> {
        Err(anyhow!("disk full"))
    }

    async fn list_for_announcement(
        &self,
        _announcement_id: &str,
    ) -> Result<Vec<crate::models::delivery_model::DeliveryAttempt>> {
        Err(anyhow!("disk full"))
    }

    async fn list_for_recipient(
        &self,
        _recipient_id: &str,
    ) -> Result<Vec<crate::models::delivery_model::DeliveryAttempt>> {
        Err(anyhow!("disk full"))
    }
}
