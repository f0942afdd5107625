//! Servicio de enriquecimiento de vehículos
//!
//! Orquesta el pipeline completo: llama al cliente de historial, pasa el
//! payload por el parser y los helpers de desempaquetado, y aplica defaults
//! por tipo de vehículo (especificaciones EV). El resultado es un documento
//! candidato listo para el merge bajo la política de protección.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::environment::EnvironmentConfig;
use crate::models::car::{ElectricSpecs, FuelEconomy, FuelType, RunningCosts};
use crate::models::history::HistoryData;
use crate::models::mot::{MotTestRecord, MotTestResult};
use crate::services::ev_specs;
use crate::services::history_client::{HistoryApiClient, MotDataSource};
use crate::services::response_parser::{
    parse_history_response, parse_mot_response, pick, validate_required_fields,
};
use crate::utils::errors::AppResult;
use crate::utils::unwrap::{best_of, extract_number, extract_string};
use crate::utils::validation::engine_size_to_liters;

/// Procedencia de los datos del pase de enriquecimiento.
/// Solo afecta a la verbosidad del logging, nunca a la política de protección.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Api,
    SpecTable,
    GenericDefault,
}

/// Resultado de un pase de enriquecimiento
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    /// Datos canónicos del chequeo de historial
    pub history_data: HistoryData,
    /// Campos requeridos ausentes en el payload crudo
    pub missing_required_fields: Vec<&'static str>,
    /// Documento candidato con los campos del Car a mergear
    pub candidate: Value,
    pub mot_history: Vec<MotTestRecord>,
    pub mot_source: MotDataSource,
    pub provenance: Provenance,
}

pub struct EnrichmentService {
    client: HistoryApiClient,
}

impl EnrichmentService {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            client: HistoryApiClient::new(config),
        }
    }

    pub fn client(&self) -> &HistoryApiClient {
        &self.client
    }

    /// Producir un registro candidato completo para una matrícula.
    ///
    /// El fallo del MOT no tumba el pase (el cliente degrada a mock); el
    /// fallo del chequeo de historial sí se propaga y el caller decide
    /// (la creación del anuncio nunca se bloquea por ello).
    pub async fn enrich(
        &self,
        registration: &str,
        mileage: Option<f64>,
    ) -> AppResult<EnrichmentResult> {
        log::info!(
            "🚗 Enriching {} (known mileage: {:?})",
            registration,
            mileage
        );

        let raw = self.client.check_history(registration).await?;
        let history_data = parse_history_response(&raw, registration);
        let missing_required_fields = validate_required_fields(&raw);

        let mot = self.client.get_mot_history(registration).await?;
        let mot_history = parse_mot_response(&mot.payload);

        let (candidate, provenance) =
            build_candidate(&raw, &history_data, &mot_history, mot.source);

        match provenance {
            Provenance::Api => {
                log::debug!("Enrichment for {} fully API-derived", registration)
            }
            Provenance::SpecTable => {
                log::info!("📋 EV specs for {} filled from built-in table", registration)
            }
            Provenance::GenericDefault => {
                log::warn!("⚠️ EV specs for {} fell back to generic defaults", registration)
            }
        }

        Ok(EnrichmentResult {
            history_data,
            missing_required_fields,
            candidate,
            mot_history,
            mot_source: mot.source,
            provenance,
        })
    }
}

pub(crate) fn parse_fuel_type(value: Option<String>) -> Option<FuelType> {
    let text = value?.to_lowercase();
    if text.contains("electric") && !text.contains("hybrid") {
        Some(FuelType::Electric)
    } else if text.contains("hybrid") {
        Some(FuelType::Hybrid)
    } else if text.contains("diesel") {
        Some(FuelType::Diesel)
    } else if text.contains("petrol") || text.contains("gasoline") {
        Some(FuelType::Petrol)
    } else {
        None
    }
}

fn insert_if_some<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        if let Ok(json) = serde_json::to_value(v) {
            if !json.is_null() {
                map.insert(key.to_string(), json);
            }
        }
    }
}

/// Construir el documento candidato a partir del payload crudo y los datos
/// ya parseados. Función pura: toda la decisión de defaults EV vive aquí.
pub fn build_candidate(
    raw: &Value,
    history: &HistoryData,
    mot_history: &[MotTestRecord],
    mot_source: MotDataSource,
) -> (Value, Provenance) {
    let empty = Value::Object(Map::new());
    let vehicle = pick(raw, &["VehicleRegistration", "vehicleRegistration", "vehicle"])
        .unwrap_or(&empty);
    let running = pick(raw, &["RunningCosts", "runningCosts"]).unwrap_or(&empty);

    let mut doc = Map::new();

    let make = extract_string(pick(vehicle, &["Make", "make"]));
    let model = extract_string(pick(vehicle, &["Model", "model"]));
    insert_if_some(&mut doc, "make", make.clone());
    insert_if_some(&mut doc, "model", model.clone());
    insert_if_some(&mut doc, "variant", extract_string(pick(vehicle, &["Variant", "variant", "trim"])));
    insert_if_some(
        &mut doc,
        "year",
        extract_number(pick(vehicle, &["YearOfManufacture", "year", "yearOfManufacture"]))
            .map(|y| y as i32),
    );
    insert_if_some(&mut doc, "color", extract_string(pick(vehicle, &["Colour", "colour", "color"])));
    insert_if_some(
        &mut doc,
        "body_type",
        extract_string(pick(vehicle, &["BodyStyle", "bodyType", "bodyStyle"])),
    );
    insert_if_some(
        &mut doc,
        "doors",
        extract_number(pick(vehicle, &["DoorCount", "doors", "numberOfDoors"])).map(|d| d as i32),
    );
    insert_if_some(
        &mut doc,
        "seats",
        extract_number(pick(vehicle, &["SeatCount", "seats", "numberOfSeats"])).map(|s| s as i32),
    );
    insert_if_some(
        &mut doc,
        "engine_size",
        extract_number(pick(vehicle, &["EngineCapacity", "engineSize", "engineCapacity"]))
            .map(engine_size_to_liters),
    );
    insert_if_some(
        &mut doc,
        "transmission",
        extract_string(pick(vehicle, &["Transmission", "transmission", "TransmissionType"]))
            .map(|t| t.to_lowercase().replace(' ', "-")),
    );

    let fuel_type = parse_fuel_type(extract_string(pick(
        vehicle,
        &["FuelType", "fuelType", "fuel"],
    )));
    insert_if_some(&mut doc, "fuel_type", fuel_type);

    let is_electric = fuel_type == Some(FuelType::Electric);

    // Rango eléctrico: puede venir top-level o dentro de runningCosts
    let electric_range = extract_number(best_of(&[
        pick(vehicle, &["electricRange", "ElectricRange"]),
        pick(running, &["electricRange", "ElectricRange"]),
    ]));

    let fuel_economy = FuelEconomy {
        urban: extract_number(pick(running, &["urban", "Urban"])),
        extra_urban: extract_number(pick(running, &["extraUrban", "ExtraUrban"])),
        combined: extract_number(pick(running, &["combined", "Combined"])),
    };

    let mut running_costs = RunningCosts {
        fuel_economy: if fuel_economy == FuelEconomy::default() {
            None
        } else {
            Some(fuel_economy)
        },
        co2_emissions: extract_number(pick(
            vehicle,
            &["Co2Emissions", "co2Emissions", "co2"],
        ))
        .or_else(|| extract_number(pick(running, &["co2Emissions", "Co2Emissions"]))),
        insurance_group: extract_string(pick(running, &["insuranceGroup", "InsuranceGroup"])),
        annual_tax: extract_number(pick(running, &["annualTax", "AnnualTax", "ved"])),
        electric_range,
    };

    let mut provenance = Provenance::Api;
    let mut electric_specs: Option<ElectricSpecs> = None;

    if is_electric {
        // Regla deliberada, no artefacto del parse: los eléctricos no tienen
        // emisiones de escape ni impuesto de circulación
        running_costs.co2_emissions = Some(0.0);
        running_costs.annual_tax = Some(0.0);

        let api_specs = ElectricSpecs {
            range_miles: electric_range,
            battery_capacity_kwh: extract_number(pick(
                vehicle,
                &["batteryCapacity", "BatteryCapacity"],
            )),
            home_charge_time_hours: extract_number(pick(
                vehicle,
                &["chargingTime", "homeChargeTime"],
            )),
            rapid_charge_time_minutes: extract_number(pick(
                vehicle,
                &["rapidChargeTime", "RapidChargeTime"],
            )),
            max_charge_speed_kw: extract_number(pick(
                vehicle,
                &["maxChargeSpeed", "MaxChargeSpeed"],
            )),
            motor_power_bhp: extract_number(pick(vehicle, &["motorPower", "MotorPower"])),
            motor_torque_nm: extract_number(pick(vehicle, &["motorTorque", "MotorTorque"])),
            charging_port_type: extract_string(pick(
                vehicle,
                &["chargingPortType", "ChargingPortType"],
            )),
        };

        let resolved = if api_specs.range_miles.is_some()
            && api_specs.battery_capacity_kwh.is_some()
        {
            api_specs
        } else if let Some(entry) = make
            .as_deref()
            .zip(model.as_deref())
            .and_then(|(mk, md)| ev_specs::lookup(mk, md))
        {
            provenance = Provenance::SpecTable;
            entry.to_specs()
        } else {
            provenance = Provenance::GenericDefault;
            ev_specs::generic_defaults()
        };

        if running_costs.electric_range.is_none() {
            running_costs.electric_range = resolved.range_miles;
        }
        electric_specs = Some(resolved);
    }

    insert_if_some(&mut doc, "electric_specs", electric_specs);
    insert_if_some(&mut doc, "running_costs", Some(running_costs));

    insert_if_some(
        &mut doc,
        "estimated_value",
        extract_number(pick(vehicle, &["estimatedValue", "EstimatedValue", "valuation"])),
    );

    // Flags de historial derivados del chequeo
    doc.insert("is_written_off".to_string(), Value::Bool(history.is_written_off));
    doc.insert("is_stolen".to_string(), Value::Bool(history.is_stolen));
    doc.insert(
        "has_outstanding_finance".to_string(),
        Value::Bool(history.has_outstanding_finance),
    );
    insert_if_some(&mut doc, "previous_owners_count", history.previous_owners_count);

    // Los datos MOT mock se devuelven para la UI pero no entran al candidato
    // persistible
    if mot_source != MotDataSource::Mock && !mot_history.is_empty() {
        let latest_expiry = mot_history
            .iter()
            .filter(|r| r.test_result == MotTestResult::Passed)
            .filter_map(|r| r.expiry_date)
            .max();

        insert_if_some(&mut doc, "mot_expiry", latest_expiry);
        insert_if_some(&mut doc, "mot_due", latest_expiry);
        let status = latest_expiry.map(|expiry| {
            if expiry > Utc::now() {
                "valid".to_string()
            } else {
                "expired".to_string()
            }
        });
        insert_if_some(&mut doc, "mot_status", status);
        insert_if_some(&mut doc, "mot_history", Some(mot_history.to_vec()));
    }

    (Value::Object(doc), provenance)
}
