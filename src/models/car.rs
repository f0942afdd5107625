//! Modelo de Car
//!
//! Este módulo contiene el struct Car (el anuncio de vehículo persistido),
//! sus enums de dominio y la máquina de estados del anuncio. El registro se
//! persiste como documento JSONB con columnas extraídas para indexación.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::mot::MotTestRecord;
use crate::utils::errors::{AppError, AppResult};

/// Tipo de combustible
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    Hybrid,
}

/// Tipo de transmisión
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Transmission {
    Manual,
    Automatic,
    SemiAutomatic,
}

/// Estado del anuncio - solo avanza, salvo eliminación explícita
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CarStatus {
    Draft,
    Incomplete,
    PendingPayment,
    Active,
    Sold,
    Expired,
    Removed,
}

impl CarStatus {
    /// Estados terminales: no hay transiciones de salida
    pub fn is_terminal(&self) -> bool {
        matches!(self, CarStatus::Sold | CarStatus::Expired | CarStatus::Removed)
    }

    /// Orden dentro de la progresión draft → incomplete → pending_payment → active
    fn rank(&self) -> u8 {
        match self {
            CarStatus::Draft => 0,
            CarStatus::Incomplete => 1,
            CarStatus::PendingPayment => 2,
            CarStatus::Active => 3,
            CarStatus::Sold | CarStatus::Expired | CarStatus::Removed => 4,
        }
    }

    /// Verificar si la transición de estado es válida.
    ///
    /// El estado solo avanza (active → incomplete no es válido); `removed`
    /// es alcanzable desde cualquier estado no terminal como eliminación
    /// explícita.
    pub fn can_transition(&self, to: CarStatus) -> bool {
        if *self == to {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if to == CarStatus::Removed {
            return true;
        }
        to.rank() > self.rank()
    }
}

/// Consumo de combustible (mpg)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FuelEconomy {
    pub urban: Option<f64>,
    pub extra_urban: Option<f64>,
    pub combined: Option<f64>,
}

/// Costes de uso derivados del enriquecimiento
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunningCosts {
    pub fuel_economy: Option<FuelEconomy>,
    pub co2_emissions: Option<f64>,
    pub insurance_group: Option<String>,
    pub annual_tax: Option<f64>,
    pub electric_range: Option<f64>,
}

/// Especificaciones de vehículo eléctrico
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ElectricSpecs {
    pub range_miles: Option<f64>,
    pub battery_capacity_kwh: Option<f64>,
    pub home_charge_time_hours: Option<f64>,
    pub rapid_charge_time_minutes: Option<f64>,
    pub max_charge_speed_kw: Option<f64>,
    pub motor_power_bhp: Option<f64>,
    pub motor_torque_nm: Option<f64>,
    pub charging_port_type: Option<String>,
}

/// Datos de contacto del vendedor
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SellerContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Estado del chequeo de historial externo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryCheckStatus {
    Pending,
    Verified,
    Failed,
    NotRequired,
}

/// Anuncio de vehículo - la entidad canónica persistida
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    /// Matrícula normalizada a mayúsculas; única entre anuncios activos
    pub registration: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    pub body_type: Option<String>,
    pub doors: Option<i32>,
    pub seats: Option<i32>,
    /// Cilindrada en litros (normalizada desde cc si hace falta)
    pub engine_size: Option<f64>,
    /// Kilometraje declarado por el vendedor, en millas
    pub mileage: Option<f64>,
    pub price: Option<Decimal>,
    pub estimated_value: Option<Decimal>,
    pub status: CarStatus,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub seller_contact: SellerContact,
    pub service_history: Option<String>,
    pub running_costs: Option<RunningCosts>,
    pub electric_specs: Option<ElectricSpecs>,
    pub mot_status: Option<String>,
    pub mot_due: Option<DateTime<Utc>>,
    pub mot_expiry: Option<DateTime<Utc>>,
    /// Historial MOT completo, más reciente primero. Se reemplaza en bloque
    /// en cada refresco, nunca se parchea registro a registro.
    #[serde(default)]
    pub mot_history: Vec<MotTestRecord>,
    pub history_check_status: HistoryCheckStatus,
    pub history_record_id: Option<Uuid>,
    pub previous_owners_count: Option<i32>,
    pub is_written_off: Option<bool>,
    pub is_stolen: Option<bool>,
    pub has_outstanding_finance: Option<bool>,
    /// Campos editados explícitamente por el vendedor; el enriquecimiento
    /// nunca los sobreescribe
    #[serde(default)]
    pub user_edited_fields: Vec<String>,
    /// Contador de versión para concurrencia optimista
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Car {
    /// Crear un anuncio nuevo en estado draft
    pub fn new(registration: Option<String>) -> Self {
        let now = Utc::now();
        let history_check_status = if registration.is_some() {
            HistoryCheckStatus::Pending
        } else {
            HistoryCheckStatus::NotRequired
        };

        Self {
            id: Uuid::new_v4(),
            registration,
            make: None,
            model: None,
            variant: None,
            year: None,
            color: None,
            fuel_type: None,
            transmission: None,
            body_type: None,
            doors: None,
            seats: None,
            engine_size: None,
            mileage: None,
            price: None,
            estimated_value: None,
            status: CarStatus::Draft,
            photos: Vec::new(),
            seller_contact: SellerContact::default(),
            service_history: None,
            running_costs: None,
            electric_specs: None,
            mot_status: None,
            mot_due: None,
            mot_expiry: None,
            mot_history: Vec::new(),
            history_check_status,
            history_record_id: None,
            previous_owners_count: None,
            is_written_off: None,
            is_stolen: None,
            has_outstanding_finance: None,
            user_edited_fields: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Serializar a documento JSON (la representación persistida)
    pub fn to_document(&self) -> AppResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Error serializing car document: {}", e)))
    }

    /// Reconstruir desde un documento JSON
    pub fn from_document(doc: Value) -> AppResult<Self> {
        serde_json::from_value(doc)
            .map_err(|e| AppError::Internal(format!("Error deserializing car document: {}", e)))
    }

    /// Verificar si un campo fue editado por el usuario
    pub fn is_user_edited(&self, field: &str) -> bool {
        self.user_edited_fields.iter().any(|f| f == field)
    }

    /// Requisitos para publicar: precio > 0, al menos una foto y contacto
    /// completo. Se reevalúa en cada update, no solo en la creación.
    pub fn meets_active_requirements(&self) -> bool {
        let has_price = self.price.map(|p| p > Decimal::ZERO).unwrap_or(false);
        let has_photo = !self.photos.is_empty();
        let has_contact =
            self.seller_contact.email.is_some() && self.seller_contact.phone.is_some();
        has_price && has_photo && has_contact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_car() -> Car {
        let mut car = Car::new(Some("AB12CDE".to_string()));
        car.price = Some(Decimal::new(9995, 0));
        car.photos = vec!["photo1.jpg".to_string()];
        car.seller_contact = SellerContact {
            email: Some("seller@example.com".to_string()),
            phone: Some("07700900000".to_string()),
        };
        car
    }

    #[test]
    fn test_new_car_defaults() {
        let car = Car::new(Some("AB12CDE".to_string()));
        assert_eq!(car.status, CarStatus::Draft);
        assert_eq!(car.version, 1);
        assert_eq!(car.history_check_status, HistoryCheckStatus::Pending);

        let without_reg = Car::new(None);
        assert_eq!(without_reg.history_check_status, HistoryCheckStatus::NotRequired);
    }

    #[test]
    fn test_status_only_advances() {
        assert!(CarStatus::Draft.can_transition(CarStatus::Incomplete));
        assert!(CarStatus::Incomplete.can_transition(CarStatus::Active));
        assert!(CarStatus::Incomplete.can_transition(CarStatus::PendingPayment));
        assert!(CarStatus::Active.can_transition(CarStatus::Sold));
        assert!(!CarStatus::Active.can_transition(CarStatus::Incomplete));
        assert!(!CarStatus::Active.can_transition(CarStatus::Draft));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CarStatus::Sold.can_transition(CarStatus::Active));
        assert!(!CarStatus::Removed.can_transition(CarStatus::Draft));
        assert!(!CarStatus::Expired.can_transition(CarStatus::Removed));
    }

    #[test]
    fn test_removed_reachable_from_any_non_terminal() {
        assert!(CarStatus::Draft.can_transition(CarStatus::Removed));
        assert!(CarStatus::Incomplete.can_transition(CarStatus::Removed));
        assert!(CarStatus::Active.can_transition(CarStatus::Removed));
    }

    #[test]
    fn test_active_requirements() {
        let car = complete_car();
        assert!(car.meets_active_requirements());

        let mut no_price = complete_car();
        no_price.price = Some(Decimal::ZERO);
        assert!(!no_price.meets_active_requirements());

        let mut no_photo = complete_car();
        no_photo.photos.clear();
        assert!(!no_photo.meets_active_requirements());

        let mut no_phone = complete_car();
        no_phone.seller_contact.phone = None;
        assert!(!no_phone.meets_active_requirements());
    }

    #[test]
    fn test_document_round_trip() {
        let car = complete_car();
        let doc = car.to_document().unwrap();
        assert_eq!(doc["status"], serde_json::json!("draft"));
        let restored = Car::from_document(doc).unwrap();
        assert_eq!(restored.id, car.id);
        assert_eq!(restored.price, car.price);
    }
}
