//! Middleware de la aplicación
//!
//! Capas transversales del router: CORS y logging de requests.

pub mod cors;
