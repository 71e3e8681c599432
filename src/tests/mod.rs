//! tests/mod.rs
mod orchestrator_tests;
mod poller_tests;
pub(crate) mod support;
