//! Núcleo de notificación de anuncios con fallback WhatsApp -> SMS -> Email.

pub mod app;
pub mod config;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod services;

#[cfg(test)]
mod tests;
