use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::models::car::{Car, CarStatus, HistoryCheckStatus};
use crate::models::mot::MotTestRecord;

// Request para crear un anuncio
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarRequest {
    pub registration: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub make: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,

    pub variant: Option<String>,

    #[validate(range(min = 1900, max = 2030))]
    pub year: Option<i32>,

    pub color: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub price: Option<Decimal>,

    #[serde(default)]
    pub photos: Vec<String>,

    #[validate(email)]
    pub seller_email: Option<String>,

    pub seller_phone: Option<String>,

    /// Kilometraje conocido, usado por el pase de enriquecimiento
    pub mileage: Option<f64>,

    /// Saltar el chequeo de historial síncrono en la creación
    #[serde(default)]
    pub skip_enrichment: bool,
}

// Request para actualizar un anuncio (parcial, con versión presentada)
#[derive(Debug, Deserialize)]
pub struct UpdateCarRequest {
    pub expected_version: i32,

    /// Re-enriquecimiento explícito; los updates nunca refrescan en
    /// background
    #[serde(default)]
    pub force_refresh: bool,

    /// Campos parciales a aplicar (cualquier campo del documento)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// Filtros para búsqueda de anuncios
#[derive(Debug, Default, Deserialize)]
pub struct CarFilters {
    pub status: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub fuel_type: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// Response de anuncio
#[derive(Debug, Serialize)]
pub struct CarResponse {
    pub id: Uuid,
    pub registration: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub fuel_type: Option<Value>,
    pub transmission: Option<Value>,
    pub mileage: Option<f64>,
    pub price: Option<Decimal>,
    pub status: CarStatus,
    pub history_check_status: HistoryCheckStatus,
    pub mot_status: Option<String>,
    pub mot_due: Option<DateTime<Utc>>,
    pub running_costs: Option<Value>,
    pub electric_specs: Option<Value>,
    pub is_written_off: Option<bool>,
    pub is_stolen: Option<bool>,
    pub has_outstanding_finance: Option<bool>,
    pub previous_owners_count: Option<i32>,
    pub user_edited_fields: Vec<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Car> for CarResponse {
    fn from(car: Car) -> Self {
        Self {
            id: car.id,
            registration: car.registration,
            make: car.make,
            model: car.model,
            variant: car.variant,
            year: car.year,
            color: car.color,
            fuel_type: car.fuel_type.and_then(|f| serde_json::to_value(f).ok()),
            transmission: car.transmission.and_then(|t| serde_json::to_value(t).ok()),
            mileage: car.mileage,
            price: car.price,
            status: car.status,
            history_check_status: car.history_check_status,
            mot_status: car.mot_status,
            mot_due: car.mot_due,
            running_costs: car.running_costs.and_then(|r| serde_json::to_value(r).ok()),
            electric_specs: car.electric_specs.and_then(|e| serde_json::to_value(e).ok()),
            is_written_off: car.is_written_off,
            is_stolen: car.is_stolen,
            has_outstanding_finance: car.has_outstanding_finance,
            previous_owners_count: car.previous_owners_count,
            user_edited_fields: car.user_edited_fields,
            version: car.version,
            created_at: car.created_at,
            updated_at: car.updated_at,
        }
    }
}

// Response del historial MOT de un anuncio
#[derive(Debug, Serialize)]
pub struct MotHistoryResponse {
    pub registration: Option<String>,
    pub mot_status: Option<String>,
    pub mot_expiry: Option<DateTime<Utc>>,
    pub tests: Vec<MotTestRecord>,
}
