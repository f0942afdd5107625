//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! desempaquetado de campos de proveedores y reintentos con backoff.

pub mod errors;
pub mod retry;
pub mod unwrap;
pub mod validation;
