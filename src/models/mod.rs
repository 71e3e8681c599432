//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod announcement_model;
pub mod delivery_model;
pub mod dispatch_model;
