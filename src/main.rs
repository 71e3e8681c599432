use std::{str::FromStr, sync::Arc};

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use announce_dispatch::{
    app,
    config::dispatch_config::DispatchConfig,
    logger::init_logger,
    services::{
        audit_logger::AuditLogger, audit_store::SqliteAuditStore,
        delivery_orchestrator::DeliveryOrchestrator, dispatch_coordinator::DispatchCoordinator,
        gateway::Gateways, status_poller::StatusPoller,
    },
};

async fn setup_database(db_url: &str) -> Result<Pool<Sqlite>> {
    // Crear carpeta "data" si la URL apunta ahí
    if db_url.contains("data/") {
        std::fs::create_dir_all("data").context("No se pudo crear directorio 'data'")?;
    }

    log::info!("Conectando a SQLite en {}", db_url);

    let options = SqliteConnectOptions::from_str(db_url)
        .context("DATABASE_URL inválida")?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")?;

    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = DispatchConfig::from_env();

    // Conectarnos a la DB
    let db_pool = setup_database(&config.database_url).await?;

    let audit_store = SqliteAuditStore::new(db_pool.clone());
    audit_store
        .run_migrations()
        .await
        .context("Fallo en migraciones de 'delivery_attempts'")?;
    let audit = AuditLogger::new(Arc::new(audit_store));

    // Gateways: se eligen real o mock una sola vez
    let gateways = Gateways::from_config(&config, reqwest::Client::new())?;

    let orchestrator =
        DeliveryOrchestrator::new(gateways, audit.clone(), StatusPoller::new(config.poll));
    let coordinator =
        DispatchCoordinator::new(orchestrator).with_max_in_flight(config.max_in_flight);

    // Levantar servidor
    log::info!("Levantando servidor en 0.0.0.0:{}", config.server_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(coordinator.clone()))
            .app_data(web::Data::new(audit.clone()))
            .configure(app::init_app)
    })
    .bind(("0.0.0.0", config.server_port))?
    .run()
    .await?;

    Ok(())
}
