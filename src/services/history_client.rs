//! Cliente de las APIs externas de historial y MOT
//!
//! Transporte fiable hacia los proveedores: timeout de 10s por intento,
//! reintentos con backoff exponencial para errores transitorios, y fallback
//! al endpoint gubernamental de MOT con datos sintéticos como último recurso.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::environment::EnvironmentConfig;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::retry::{run_with_retry, Backoff};
use crate::utils::validation::normalize_registration;

/// Error de transporte de una llamada individual
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connect(String),

    #[error("server error {status}: {status_text}")]
    Server { status: u16, status_text: String },

    #[error("client error {status}: {status_text}")]
    Client { status: u16, status_text: String },

    #[error("invalid response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Timeout, fallo de conexión/DNS y 5xx se reintentan; el resto no
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout | TransportError::Connect(_) | TransportError::Server { .. }
        )
    }
}

/// Procedencia del dataset MOT devuelto
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MotDataSource {
    Primary,
    Government,
    /// Dataset sintético de degradación: nunca debe persistirse como real
    Mock,
}

/// Payload MOT crudo junto con su procedencia
#[derive(Debug, Clone)]
pub struct MotHistoryPayload {
    pub payload: Value,
    pub source: MotDataSource,
}

pub struct HistoryApiClient {
    client: reqwest::Client,
    history_api_url: String,
    history_api_key: String,
    mot_api_url: String,
    gov_mot_api_url: String,
    gov_mot_api_key: Option<String>,
    test_mode: bool,
}

const MAX_ATTEMPTS: u32 = 3;

impl HistoryApiClient {
    pub fn new(config: &EnvironmentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            history_api_url: config.history_api_url.clone(),
            history_api_key: config.history_api_key.clone(),
            mot_api_url: config.mot_api_url.clone(),
            gov_mot_api_url: config.gov_mot_api_url.clone(),
            gov_mot_api_key: config.gov_mot_api_key.clone(),
            test_mode: config.history_api_test_mode,
        }
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Validar la matrícula antes de gastar llamadas.
    ///
    /// En modo test el sandbox del proveedor solo acepta matrículas que
    /// contengan la letra "A"; fallamos rápido con un error descriptivo.
    pub fn validate_vrm(&self, registration: &str) -> AppResult<String> {
        let vrm = normalize_registration(registration);
        if vrm.is_empty() {
            return Err(AppError::BadRequest(
                "Registration must be a non-empty string".to_string(),
            ));
        }

        if self.test_mode && !vrm.contains('A') {
            return Err(AppError::BadRequest(format!(
                "Test-mode registration '{}' must contain the letter 'A' (provider sandbox constraint)",
                vrm
            )));
        }

        Ok(vrm)
    }

    /// Chequeo de historial con reintentos (1s, 2s entre intentos).
    ///
    /// Al agotar los reintentos devuelve un error enriquecido con el estado
    /// HTTP y el contexto de matrícula/modo; el caller lo loguea una sola vez
    /// en la frontera, no por reintento.
    pub async fn check_history(&self, registration: &str) -> AppResult<Value> {
        let vrm = self.validate_vrm(registration)?;

        let url = format!(
            "{}/vehicledata/carhistorycheck?apikey={}&vrm={}",
            self.history_api_url,
            self.history_api_key,
            urlencoding::encode(&vrm)
        );

        log::info!("🔍 Checking vehicle history for {}", vrm);

        let result = run_with_retry(
            MAX_ATTEMPTS,
            Backoff::Exponential(Duration::from_secs(1)),
            |_attempt| self.fetch_json(&url, None),
            TransportError::is_transient,
        )
        .await;

        result.map_err(|e| {
            let mode = if self.test_mode { "test" } else { "live" };
            AppError::ExternalApi(format!(
                "History check failed for '{}' (mode: {}): {}",
                vrm, mode, e
            ))
        })
    }

    /// Historial MOT: endpoint primario, luego el endpoint gubernamental con
    /// autenticación por header, y como último recurso un dataset sintético
    /// marcado como mock para que la UI siga funcionando en modo degradado.
    pub async fn get_mot_history(&self, registration: &str) -> AppResult<MotHistoryPayload> {
        let vrm = self.validate_vrm(registration)?;

        let primary_url = format!(
            "{}/vehicledata/mothistory?apikey={}&vrm={}",
            self.mot_api_url,
            self.history_api_key,
            urlencoding::encode(&vrm)
        );

        match self.fetch_json(&primary_url, None).await {
            Ok(payload) => {
                return Ok(MotHistoryPayload {
                    payload,
                    source: MotDataSource::Primary,
                });
            }
            Err(e) => {
                log::warn!("⚠️ Primary MOT endpoint failed for {}: {}", vrm, e);
            }
        }

        let gov_url = format!(
            "{}/trade/vehicles/mot-tests?registration={}",
            self.gov_mot_api_url,
            urlencoding::encode(&vrm)
        );

        match self
            .fetch_json(&gov_url, self.gov_mot_api_key.as_deref())
            .await
        {
            Ok(payload) => {
                return Ok(MotHistoryPayload {
                    payload,
                    source: MotDataSource::Government,
                });
            }
            Err(e) => {
                log::error!("❌ Government MOT fallback failed for {}: {}", vrm, e);
            }
        }

        log::warn!("⚠️ Both MOT providers down, returning mock dataset for {}", vrm);
        Ok(MotHistoryPayload {
            payload: mock_mot_dataset(&vrm),
            source: MotDataSource::Mock,
        })
    }

    /// Una llamada individual, clasificando el error para la política de
    /// reintentos
    async fn fetch_json(&self, url: &str, api_key_header: Option<&str>) -> Result<Value, TransportError> {
        let mut request = self.client.get(url).header("User-Agent", "CarMarketplace/1.0");
        if let Some(key) = api_key_header {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Server {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        if status.is_client_error() {
            return Err(TransportError::Client {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}

/// Dataset MOT sintético para el modo degradado.
/// Lleva `source: "mock"` dentro del payload para que nunca se confunda
/// con datos reales.
fn mock_mot_dataset(vrm: &str) -> Value {
    json!({
        "registration": vrm,
        "source": "mock",
        "motTests": [
            {
                "completedDate": "2024-03-10",
                "testResult": "PASSED",
                "expiryDate": "2025-03-09",
                "odometerValue": 41250,
                "odometerUnit": "mi",
                "defects": [
                    { "type": "ADVISORY", "text": "Front tyres worn close to legal limit" }
                ]
            },
            {
                "completedDate": "2023-03-02",
                "testResult": "PASSED",
                "expiryDate": "2024-03-01",
                "odometerValue": 33480,
                "odometerUnit": "mi",
                "defects": []
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(test_mode: bool) -> EnvironmentConfig {
        EnvironmentConfig {
            environment: "test".to_string(),
            port: 3000,
            host: "localhost".to_string(),
            cors_origins: vec![],
            history_api_url: "http://history.invalid".to_string(),
            history_api_key: "key".to_string(),
            mot_api_url: "http://mot.invalid".to_string(),
            gov_mot_api_url: "http://gov-mot.invalid".to_string(),
            gov_mot_api_key: Some("gov-key".to_string()),
            history_api_test_mode: test_mode,
        }
    }

    #[test]
    fn test_validate_vrm_normalizes() {
        let client = HistoryApiClient::new(&test_config(false));
        assert_eq!(client.validate_vrm("ab12 cde").unwrap(), "AB12CDE");
    }

    #[test]
    fn test_validate_vrm_rejects_empty() {
        let client = HistoryApiClient::new(&test_config(false));
        assert!(matches!(
            client.validate_vrm("   "),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_test_mode_requires_letter_a() {
        let client = HistoryApiClient::new(&test_config(true));
        // Sin "A": fallo inmediato con mensaje descriptivo
        let err = client.validate_vrm("XY12 ZZZ").unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert!(msg.contains("letter 'A'")),
            other => panic!("unexpected error: {:?}", other),
        }
        // Con "A": pasa
        assert!(client.validate_vrm("XA12 ZZZ").is_ok());
    }

    #[test]
    fn test_live_mode_does_not_require_letter_a() {
        let client = HistoryApiClient::new(&test_config(false));
        assert!(client.validate_vrm("XY12 ZZZ").is_ok());
    }

    #[test]
    fn test_mock_dataset_is_tagged() {
        let payload = mock_mot_dataset("AB12CDE");
        assert_eq!(payload["source"], "mock");
        assert!(payload["motTests"].as_array().unwrap().len() >= 2);
    }

    #[test]
    fn test_transport_error_classification() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Connect("dns".to_string()).is_transient());
        assert!(TransportError::Server { status: 502, status_text: "Bad Gateway".to_string() }
            .is_transient());
        assert!(!TransportError::Client { status: 404, status_text: "Not Found".to_string() }
            .is_transient());
        assert!(!TransportError::Body("bad json".to_string()).is_transient());
    }
}
