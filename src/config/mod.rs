//! Configuración del proyecto
//!
//! Este módulo contiene la configuración por variables de entorno del
//! servidor y los proveedores externos.

pub mod environment;

pub use environment::*;
