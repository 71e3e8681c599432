//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod audit_logger;
pub mod audit_store;
pub mod delivery_orchestrator;
pub mod dispatch_coordinator;
pub mod gateway;
pub mod phone_normalizer;
pub mod status_poller;
