use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::{
    models::dispatch_model::{DispatchOutcome, DispatchRequest, DispatchResponse},
    services::{audit_logger::AuditLogger, dispatch_coordinator::DispatchCoordinator},
};

/// POST /api/announcements/dispatch
pub async fn dispatch_announcement_endpoint(
    body: web::Json<DispatchRequest>,
    coordinator: web::Data<DispatchCoordinator>,
) -> HttpResponse {
    let DispatchRequest {
        announcement,
        recipients,
        async_send,
    } = body.into_inner();
    let announcement_id = announcement.id.clone();

    // Asíncrono o síncrono
    if async_send {
        let coordinator = coordinator.get_ref().clone();
        let total = recipients.len();

        tokio::spawn(async move {
            let outcome = coordinator.dispatch(announcement, recipients).await;
            if let DispatchOutcome::Completed { results } = outcome {
                let delivered = results.iter().filter(|r| r.success).count();
                log::info!(
                    "(dispatch_announcement_endpoint) Despacho async terminado: {}/{}",
                    delivered,
                    results.len()
                );
            }
        });

        HttpResponse::Accepted().json(DispatchResponse {
            success: true,
            announcement_id,
            message: format!("Dispatch queued for {} recipients", total),
            outcome: None,
        })
    } else {
        let outcome = coordinator.dispatch(announcement, recipients).await;
        HttpResponse::Ok().json(DispatchResponse {
            success: true,
            announcement_id,
            message: "Dispatch finished".to_string(),
            outcome: Some(outcome),
        })
    }
}

/// GET /api/announcements/{id}/deliveries
pub async fn announcement_deliveries_endpoint(
    path: web::Path<String>,
    audit: web::Data<AuditLogger>,
) -> HttpResponse {
    let announcement_id = path.into_inner();
    match audit.store().list_for_announcement(&announcement_id).await {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => {
            log::error!("(announcement_deliveries_endpoint) {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("{}", e)
            }))
        }
    }
}

/// GET /api/recipients/{id}/deliveries
pub async fn recipient_deliveries_endpoint(
    path: web::Path<String>,
    audit: web::Data<AuditLogger>,
) -> HttpResponse {
    let recipient_id = path.into_inner();
    match audit.store().list_for_recipient(&recipient_id).await {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => {
            log::error!("(recipient_deliveries_endpoint) {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("{}", e)
            }))
        }
    }
}
