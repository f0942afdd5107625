//! Rutas de la API
//!
//! Este módulo define los routers de Axum y los handlers HTTP.

pub mod car_routes;
