//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use std::env;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    // Proveedor de historial de vehículos
    pub history_api_url: String,
    pub history_api_key: String,
    pub history_api_test_mode: bool,
    // Proveedores de historial MOT
    pub mot_api_url: String,
    pub gov_mot_api_url: String,
    pub gov_mot_api_key: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            port: env::var("PORT")
                .expect("PORT must be set")
                .parse()
                .expect("PORT must be a valid number"),
            host: env::var("HOST").expect("HOST must be set"),
            cors_origins: env::var("CORS_ORIGINS")
                .expect("CORS_ORIGINS must be set")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            history_api_url: env::var("HISTORY_API_URL").expect("HISTORY_API_URL must be set"),
            history_api_key: env::var("HISTORY_API_KEY").expect("HISTORY_API_KEY must be set"),
            history_api_test_mode: env::var("HISTORY_API_TEST_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            mot_api_url: env::var("MOT_API_URL").expect("MOT_API_URL must be set"),
            gov_mot_api_url: env::var("GOV_MOT_API_URL").expect("GOV_MOT_API_URL must be set"),
            gov_mot_api_key: env::var("GOV_MOT_API_KEY").ok(),
        }
    }
}

impl EnvironmentConfig {
    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
