//! handlers/mod.rs
//! Módulo que agrupa los handlers HTTP.
pub mod dispatch_handler;
