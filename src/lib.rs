//! Backend del marketplace de vehículos
//!
//! Núcleo del anuncio de coches de segunda mano: pipeline de enriquecimiento
//! desde proveedores de historial y MOT, política de protección de datos
//! editados por el vendedor y protocolo de escritura con concurrencia
//! optimista.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
