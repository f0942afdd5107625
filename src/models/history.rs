//! Modelo de HistoryRecord
//!
//! Resultado de un chequeo de historial externo (siniestros, robo,
//! financiación pendiente). Se conserva por auditoría: un Car referencia su
//! chequeo más reciente pero los antiguos no se borran automáticamente.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resultado global del chequeo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    /// Parse degradado: solo se extrajo un subconjunto de campos
    Partial,
    Failed,
}

/// Detalle de siniestro
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AccidentDetails {
    /// Severidad: reutiliza la categoría de siniestro total cuando existe
    pub severity: Option<String>,
    pub description: Option<String>,
}

/// Detalle de siniestro total declarado por la aseguradora
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WriteOffDetails {
    pub status: Option<String>,
    pub loss_date: Option<NaiveDate>,
    pub category: Option<String>,
}

/// Detalle de denuncia de robo
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StolenDetails {
    pub reported_date: Option<NaiveDate>,
    pub status: Option<String>,
}

/// Detalle de financiación pendiente
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FinanceDetails {
    pub amount: Option<f64>,
    pub lender: Option<String>,
    pub agreement_type: Option<String>,
}

/// Cambio de titular registrado
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct KeeperChange {
    pub date: Option<NaiveDate>,
    pub keeper_count: Option<i32>,
}

/// Datos canónicos de un chequeo de historial (salida del parser)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryData {
    pub vrm: Option<String>,
    pub has_accident_history: bool,
    pub accident_details: Option<AccidentDetails>,
    pub is_written_off: bool,
    /// "none" cuando no hay registro de siniestro total; "unknown" cuando el
    /// registro existe pero el proveedor no informó la categoría
    pub write_off_category: String,
    pub write_off_details: Option<WriteOffDetails>,
    pub is_stolen: bool,
    pub stolen_details: Option<StolenDetails>,
    pub has_outstanding_finance: bool,
    pub finance_details: Option<FinanceDetails>,
    pub is_scrapped: bool,
    pub is_imported: bool,
    pub is_exported: bool,
    pub previous_owners_count: Option<i32>,
    pub v5c_certificate_count: Option<i32>,
    #[serde(default)]
    pub keeper_changes: Vec<KeeperChange>,
    pub check_status: CheckStatus,
    /// Campos que el parse parcial no pudo extraer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_fields: Vec<String>,
}

impl Default for HistoryData {
    fn default() -> Self {
        Self {
            vrm: None,
            has_accident_history: false,
            accident_details: None,
            is_written_off: false,
            write_off_category: "none".to_string(),
            write_off_details: None,
            is_stolen: false,
            stolen_details: None,
            has_outstanding_finance: false,
            finance_details: None,
            is_scrapped: false,
            is_imported: false,
            is_exported: false,
            previous_owners_count: None,
            v5c_certificate_count: None,
            keeper_changes: Vec::new(),
            check_status: CheckStatus::Failed,
            unavailable_fields: Vec::new(),
        }
    }
}

/// Registro persistido de un chequeo de historial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub registration: String,
    pub checked_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: HistoryData,
    pub api_provider: Option<String>,
    pub test_mode: bool,
    // Campos espejo del Car enlazado (escritura secundaria best-effort)
    pub service_history: Option<String>,
    pub mot_due: Option<DateTime<Utc>>,
    pub seats: Option<i32>,
    pub fuel_type: Option<String>,
}

impl HistoryRecord {
    /// Crear un registro a partir de un chequeo recién parseado
    pub fn from_check(
        registration: &str,
        data: HistoryData,
        api_provider: Option<String>,
        test_mode: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registration: registration.to_string(),
            checked_at: Utc::now(),
            data,
            api_provider,
            test_mode,
            service_history: None,
            mot_due: None,
            seats: None,
            fuel_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_history_data_is_clean() {
        let data = HistoryData::default();
        assert!(!data.is_written_off);
        assert_eq!(data.write_off_category, "none");
        assert!(!data.is_stolen);
        assert_eq!(data.check_status, CheckStatus::Failed);
    }

    #[test]
    fn test_from_check() {
        let data = HistoryData {
            check_status: CheckStatus::Success,
            ..HistoryData::default()
        };
        let record = HistoryRecord::from_check("AB12CDE", data, Some("vdg".to_string()), false);
        assert_eq!(record.registration, "AB12CDE");
        assert_eq!(record.data.check_status, CheckStatus::Success);
        assert!(!record.test_mode);
        assert!(record.service_history.is_none());
    }

    #[test]
    fn test_serializes_flat() {
        let record = HistoryRecord::from_check("AB12CDE", HistoryData::default(), None, true);
        let json = serde_json::to_value(&record).unwrap();
        // Los campos del chequeo quedan al nivel raíz del documento
        assert_eq!(json["is_written_off"], serde_json::json!(false));
        assert_eq!(json["write_off_category"], serde_json::json!("none"));
        assert_eq!(json["registration"], serde_json::json!("AB12CDE"));
    }
}
