//! services/status_poller.rs
//! Espera acotada de la confirmación asíncrona de un canal.

use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use crate::{
    config::dispatch_config::PollSettings,
    models::delivery_model::PollOutcome,
    services::gateway::ChannelGateway,
};

pub const CONFIRMED_STATUSES: [&str; 2] = ["delivered", "read"];
pub const FAILED_STATUSES: [&str; 2] = ["failed", "undelivered"];

pub const STATUS_TIMEOUT: &str = "timeout";
pub const STATUS_ERROR: &str = "error";

pub fn is_confirmed(status: &str) -> bool {
    CONFIRMED_STATUSES.contains(&status)
}

pub fn is_terminal(status: &str) -> bool {
    is_confirmed(status) || FAILED_STATUSES.contains(&status)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPoller {
    settings: PollSettings,
}

impl StatusPoller {
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    /// Consulta el estado de `message_id` hasta llegar a un estado terminal
    /// o agotar el tiempo. Un error de transporte corta el ciclo sin reintento.
    pub async fn await_confirmation(
        &self,
        gateway: &dyn ChannelGateway,
        message_id: &str,
    ) -> PollOutcome {
        // Un timeout que no entra en un Instant equivale a esperar sin límite.
        let deadline = Instant::now().checked_add(self.settings.timeout);
        let mut checks = 0u32;

        loop {
            checks += 1;
            match gateway.fetch_status(message_id).await {
                Ok(report) if is_terminal(&report.status) => {
                    log::info!(
                        "(await_confirmation) {} message_id={} -> '{}' tras {} consultas",
                        gateway.channel(),
                        message_id,
                        report.status,
                        checks
                    );
                    return PollOutcome {
                        is_final: true,
                        status: report.status,
                        info: report.info,
                    };
                }
                Ok(report) => {
                    log::debug!(
                        "(await_confirmation) message_id={} sigue en '{}'",
                        message_id,
                        report.status
                    );
                }
                Err(e) => {
                    log::error!(
                        "(await_confirmation) Error consultando message_id={}: {:?}",
                        message_id,
                        e
                    );
                    return PollOutcome {
                        is_final: false,
                        status: STATUS_ERROR.to_string(),
                        info: json!(format!("{:#}", e)),
                    };
                }
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.settings.interval.min(deadline - now)
                }
                None => self.settings.interval,
            };
            sleep(pause).await;
        }

        log::warn!(
            "(await_confirmation) message_id={} sin estado terminal en {:?}",
            message_id,
            self.settings.timeout
        );
        PollOutcome {
            is_final: false,
            status: STATUS_TIMEOUT.to_string(),
            info: Value::Null,
        }
    }
}
