//! services/dispatch_coordinator.rs
//! Reparte un anuncio entre todos los destinatarios: una tarea por destinatario,
//! sin orden entre ellas, y junta los resultados al final.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::{stream::FuturesUnordered, StreamExt};
use serde_json::json;
use tokio::{
    sync::Semaphore,
    task::JoinError,
    time::{timeout_at, Instant},
};

use crate::{
    models::{
        announcement_model::{Announcement, Recipient},
        delivery_model::{Channel, OrchestrationResult},
        dispatch_model::DispatchOutcome,
    },
    services::delivery_orchestrator::DeliveryOrchestrator,
};

#[derive(Clone)]
pub struct DispatchCoordinator {
    orchestrator: DeliveryOrchestrator,
    limiter: Option<Arc<Semaphore>>,
}

impl DispatchCoordinator {
    pub fn new(orchestrator: DeliveryOrchestrator) -> Self {
        Self {
            orchestrator,
            limiter: None,
        }
    }

    /// Limita cuántos destinatarios se procesan a la vez.
    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.limiter = max_in_flight
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Espera a que todos los destinatarios terminen.
    pub async fn dispatch(
        &self,
        announcement: Announcement,
        recipients: Vec<Recipient>,
    ) -> DispatchOutcome {
        self.run(announcement, recipients, None).await
    }

    /// Deja de esperar al vencer `deadline`. Los envíos en curso no se
    /// cancelan: terminan y registran por su cuenta.
    /// Un plazo que no entra en un Instant se trata como sin plazo.
    pub async fn dispatch_with_deadline(
        &self,
        announcement: Announcement,
        recipients: Vec<Recipient>,
        deadline: Duration,
    ) -> DispatchOutcome {
        let at = Instant::now().checked_add(deadline);
        if at.is_none() {
            log::warn!(
                "(dispatch_with_deadline) Plazo {:?} fuera de rango, se espera a todos.",
                deadline
            );
        }
        self.run(announcement, recipients, at).await
    }

    async fn run(
        &self,
        announcement: Announcement,
        recipients: Vec<Recipient>,
        deadline: Option<Instant>,
    ) -> DispatchOutcome {
        if recipients.is_empty() {
            log::warn!(
                "(dispatch) No hay destinatarios para announcement_id={}",
                announcement.id
            );
            return DispatchOutcome::NoRecipients {
                notice: format!("No recipients to notify for announcement {}", announcement.id),
            };
        }

        log::info!(
            "(dispatch) announcement_id={} -> {} destinatarios",
            announcement.id,
            recipients.len()
        );

        let announcement = Arc::new(announcement);
        let ids: Vec<String> = recipients.iter().map(|r| r.id.clone()).collect();
        // Terminados por id; un id repetido cuenta una vez por destinatario.
        let mut settled: HashMap<String, usize> = HashMap::with_capacity(ids.len());
        let mut in_flight: FuturesUnordered<_> = recipients
            .into_iter()
            .map(|recipient| {
                let recipient_id = recipient.id.clone();
                let handle = self.spawn_orchestration(announcement.clone(), recipient);
                async move { (recipient_id, handle.await) }
            })
            .collect();

        let mut results = Vec::with_capacity(ids.len());
        loop {
            let next = match deadline {
                Some(at) => match timeout_at(at, in_flight.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let pending: Vec<String> = ids
                            .into_iter()
                            .filter(|id| match settled.get_mut(id) {
                                Some(n) if *n > 0 => {
                                    *n -= 1;
                                    false
                                }
                                _ => true,
                            })
                            .collect();
                        log::warn!(
                            "(dispatch) Venció el plazo para announcement_id={}; {} pendientes",
                            announcement.id,
                            pending.len()
                        );
                        return DispatchOutcome::DeadlineExceeded { results, pending };
                    }
                },
                None => in_flight.next().await,
            };

            let Some((recipient_id, joined)) = next else {
                break;
            };
            *settled.entry(recipient_id.clone()).or_default() += 1;
            results.push(match joined {
                Ok(result) => result,
                Err(e) => aborted_result(recipient_id, &e),
            });
        }

        let delivered = results.iter().filter(|r| r.success).count();
        log::info!(
            "(dispatch) announcement_id={} finalizado: {}/{} entregados",
            announcement.id,
            delivered,
            results.len()
        );
        DispatchOutcome::Completed { results }
    }

    fn spawn_orchestration(
        &self,
        announcement: Arc<Announcement>,
        recipient: Recipient,
    ) -> tokio::task::JoinHandle<OrchestrationResult> {
        let orchestrator = self.orchestrator.clone();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            orchestrator.orchestrate(&announcement, &recipient).await
        })
    }
}

/// Resultado para un destinatario cuya tarea terminó con panic.
fn aborted_result(recipient_id: String, error: &JoinError) -> OrchestrationResult {
    log::error!(
        "(dispatch) La orquestación de recipient_id={} terminó abruptamente: {}",
        recipient_id,
        error
    );
    OrchestrationResult {
        recipient_id,
        channel: Channel::Email,
        success: false,
        response: json!({ "error": "orchestration_aborted", "detail": error.to_string() }),
    }
}
