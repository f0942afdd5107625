//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos persistidos como documentos
//! JSONB con las convenciones estándar.

pub mod car;
pub mod history;
pub mod mot;
