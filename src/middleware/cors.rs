//! Middleware de CORS
//!
//! Este módulo maneja la configuración de CORS para permitir
//! requests desde diferentes orígenes.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::config::environment::EnvironmentConfig;

/// Crear la capa de CORS según el entorno.
///
/// En desarrollo se permite cualquier origen; en producción solo los
/// orígenes configurados en CORS_ORIGINS.
pub fn cors_middleware(config: &EnvironmentConfig) -> CorsLayer {
    if config.is_development() {
        return CorsLayer::very_permissive();
    }

    let mut cors = CorsLayer::new();

    for origin in &config.cors_origins {
        if let Ok(header_value) = HeaderValue::from_str(origin) {
            cors = cors.allow_origin(header_value);
        } else {
            log::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
        }
    }

    cors.allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([
        HeaderName::from_static("content-type"),
        HeaderName::from_static("accept"),
        HeaderName::from_static("origin"),
        HeaderName::from_static("x-requested-with"),
    ])
    .max_age(std::time::Duration::from_secs(3600))
}
