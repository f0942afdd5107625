//! Controller de anuncios
//!
//! Orquesta el ciclo de vida del anuncio: creación con chequeo de historial
//! síncrono, updates parciales bajo el protocolo de escritura concurrente y
//! re-enriquecimiento explícito.

use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::environment::EnvironmentConfig;
use crate::dto::api::ApiResponse;
use crate::dto::car_dto::{CarFilters, CarResponse, CreateCarRequest, MotHistoryResponse, UpdateCarRequest};
use crate::models::car::{Car, Transmission};
use crate::models::history::HistoryRecord;
use crate::repositories::{CarRepository, CarStore, HistoryRepository, HistoryStore};
use crate::services::concurrent_update::ConcurrentUpdateProtocol;
use crate::services::enrichment_service::parse_fuel_type;
use crate::services::reconciliation_service::{evaluate_status, ReconcileOptions, ReconciliationEngine};
use crate::utils::errors::{bad_request_error, conflict_error, not_found_error, AppResult};
use crate::utils::validation::validate_registration;

pub struct CarController {
    store: Arc<dyn CarStore>,
    history: Arc<dyn HistoryStore>,
    protocol: ConcurrentUpdateProtocol,
    engine: ReconciliationEngine,
}

impl CarController {
    pub fn new(pool: PgPool, config: &EnvironmentConfig) -> Self {
        let store: Arc<dyn CarStore> = Arc::new(CarRepository::new(pool.clone()));
        let history: Arc<dyn HistoryStore> = Arc::new(HistoryRepository::new(pool));
        Self {
            protocol: ConcurrentUpdateProtocol::new(store.clone(), history.clone()),
            engine: ReconciliationEngine::new(config),
            store,
            history,
        }
    }

    /// Crear un anuncio.
    ///
    /// Si llega matrícula se chequea el historial de forma síncrona; el fallo
    /// del chequeo degrada el anuncio, nunca bloquea la creación.
    pub async fn create(
        &self,
        request: CreateCarRequest,
    ) -> AppResult<ApiResponse<CarResponse>> {
        request.validate()?;

        let registration = match &request.registration {
            Some(raw) => Some(
                validate_registration(raw)
                    .map_err(|_| bad_request_error("Invalid registration format"))?,
            ),
            None => None,
        };

        // Unicidad solo entre anuncios activos: un anuncio vendido o retirado
        // con la misma matrícula no bloquea
        if let Some(reg) = &registration {
            if self.store.find_active_by_registration(reg).await?.is_some() {
                return Err(conflict_error("Car", "registration", reg));
            }
        }

        let mut car = Car::new(registration);
        car.make = request.make;
        car.model = request.model;
        car.variant = request.variant;
        car.year = request.year;
        car.color = request.color;
        car.fuel_type = parse_fuel_type(request.fuel_type);
        car.transmission = parse_transmission(request.transmission);
        car.mileage = request.mileage;
        car.price = request.price;
        car.photos = request.photos;
        car.seller_contact.email = request.seller_email;
        car.seller_contact.phone = request.seller_phone;
        evaluate_status(&mut car);

        let options = ReconcileOptions {
            skip_enrichment: request.skip_enrichment,
            ..Default::default()
        };
        let outcome = self.engine.reconcile(&car, &options).await?;

        if let Some(record) = &outcome.history_record {
            self.persist_history_record(record).await;
        }

        self.store.insert(&outcome.car).await?;

        log::info!(
            "🚗 Car {} created (status: {:?}, history: {:?})",
            outcome.car.id,
            outcome.car.status,
            outcome.car.history_check_status
        );

        Ok(ApiResponse::success_with_message(
            outcome.car.into(),
            "Car created successfully".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<CarResponse> {
        let car = self.load(id).await?;
        Ok(car.into())
    }

    pub async fn list(&self, filters: CarFilters) -> AppResult<Vec<CarResponse>> {
        let cars = self.store.find_by_filter(&filters).await?;
        Ok(cars.into_iter().map(CarResponse::from).collect())
    }

    /// Update parcial con versión presentada.
    ///
    /// Con `force_refresh` se re-enriquece después de aplicar los campos del
    /// usuario; el candidato se mergea bajo el protocolo para que ningún
    /// escritor concurrente se pierda.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCarRequest,
    ) -> AppResult<ApiResponse<CarResponse>> {
        let car = self
            .protocol
            .apply_update(id, request.expected_version, request.fields)
            .await?;

        let car = if request.force_refresh {
            self.refresh(car).await?
        } else {
            car
        };

        Ok(ApiResponse::success_with_message(
            car.into(),
            "Car updated successfully".to_string(),
        ))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let car = self.load(id).await?;

        // El registro de historial enlazado se va con el anuncio
        if let Some(record_id) = car.history_record_id {
            if let Err(e) = self.history.delete(record_id).await {
                log::warn!("⚠️ Failed to delete history record {}: {}", record_id, e);
            }
        }

        self.store.delete(id).await?;
        log::info!("🗑️ Car {} deleted", id);
        Ok(())
    }

    /// Obtener el registro del último chequeo de historial del anuncio
    pub async fn get_history(&self, id: Uuid) -> AppResult<HistoryRecord> {
        let car = self.load(id).await?;

        let record_id = car
            .history_record_id
            .ok_or_else(|| not_found_error("History record for car", &id.to_string()))?;

        self.history
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| not_found_error("History record", &record_id.to_string()))
    }

    /// Obtener el historial MOT persistido del anuncio
    pub async fn get_mot(&self, id: Uuid) -> AppResult<MotHistoryResponse> {
        let car = self.load(id).await?;
        Ok(MotHistoryResponse {
            registration: car.registration,
            mot_status: car.mot_status,
            mot_expiry: car.mot_expiry,
            tests: car.mot_history,
        })
    }

    async fn load(&self, id: Uuid) -> AppResult<Car> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Car", &id.to_string()))
    }

    /// Re-enriquecimiento explícito sobre un anuncio recién actualizado
    async fn refresh(&self, car: Car) -> AppResult<Car> {
        let options = ReconcileOptions {
            force_refresh: true,
            ..Default::default()
        };
        let outcome = self.engine.reconcile(&car, &options).await?;

        match outcome.candidate {
            Some(candidate) => {
                if let Some(record) = &outcome.history_record {
                    self.persist_history_record(record).await;
                }
                self.protocol
                    .apply_reconciled(car.id, car.version, &candidate)
                    .await
            }
            None => {
                // Chequeo fallido o saltado: persistir solo el cambio de
                // estado del chequeo, si lo hubo
                if outcome.car.history_check_status != car.history_check_status {
                    let patch: Value = json!({
                        "history_check_status": outcome.car.history_check_status
                    });
                    self.protocol
                        .apply_reconciled(car.id, car.version, &patch)
                        .await
                } else {
                    Ok(car)
                }
            }
        }
    }

    /// Persistencia del registro de chequeo: datos de auditoría derivados,
    /// su fallo no revierte la operación primaria
    async fn persist_history_record(&self, record: &HistoryRecord) {
        if let Err(e) = self.history.insert(record).await {
            log::warn!("⚠️ Failed to persist history record {}: {}", record.id, e);
        }
    }
}

fn parse_transmission(value: Option<String>) -> Option<Transmission> {
    let normalized = value?.trim().to_lowercase().replace(' ', "-");
    serde_json::from_value::<Transmission>(Value::String(normalized)).ok()
}
