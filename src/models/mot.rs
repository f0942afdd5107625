//! Modelo de MOT
//!
//! Registros de inspección MOT. Inmutables una vez descargados: el historial
//! completo se reemplaza de forma atómica en cada refresco.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resultado de una inspección
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotTestResult {
    Passed,
    Failed,
}

/// Tipo de defecto anotado en la inspección
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotDefectType {
    Advisory,
    Fail,
    Dangerous,
}

/// Defecto individual
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotDefect {
    #[serde(rename = "type")]
    pub defect_type: MotDefectType,
    pub text: String,
    #[serde(default)]
    pub dangerous: bool,
}

/// Registro de una inspección MOT
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotTestRecord {
    pub test_date: DateTime<Utc>,
    /// Null cuando la inspección falló
    pub expiry_date: Option<DateTime<Utc>>,
    pub test_result: MotTestResult,
    pub odometer_value: Option<f64>,
    /// Normalizado a minúsculas: "mi" o "km"
    pub odometer_unit: Option<String>,
    #[serde(default)]
    pub defects: Vec<MotDefect>,
    /// Textos de avisos (defectos ADVISORY aplanados para mostrar)
    #[serde(default)]
    pub advisory_notices: Vec<String>,
    pub test_station: Option<String>,
}
