//! app.rs
use crate::handlers::dispatch_handler;
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/announcements")
                    .route(
                        "/dispatch",
                        web::post().to(dispatch_handler::dispatch_announcement_endpoint),
                    )
                    .route(
                        "/{id}/deliveries",
                        web::get().to(dispatch_handler::announcement_deliveries_endpoint),
                    ),
            )
            .service(web::scope("/recipients").route(
                "/{id}/deliveries",
                web::get().to(dispatch_handler::recipient_deliveries_endpoint),
            )),
    );
}
