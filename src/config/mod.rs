//! config/mod.rs
pub mod dispatch_config;
