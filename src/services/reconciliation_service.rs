//! Motor de reconciliación
//!
//! Dado un anuncio persistido y un candidato recién descargado, produce el
//! registro mergeado bajo la política de protección, decide cuándo toca
//! re-enriquecer y mantiene la máquina de estados del anuncio.

use chrono::Utc;
use serde_json::Value;

use crate::config::environment::EnvironmentConfig;
use crate::models::car::{Car, CarStatus, HistoryCheckStatus};
use crate::models::history::{CheckStatus, HistoryRecord};
use crate::services::data_protection::{is_empty_value, should_apply};
use crate::services::enrichment_service::EnrichmentService;
use crate::services::history_client::MotDataSource;
use crate::utils::errors::{AppError, AppResult};

/// Opciones del pase de reconciliación.
///
/// Se pasan explícitamente por parámetro; nunca flags mutados sobre la
/// propia entidad.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub skip_enrichment: bool,
    pub force_refresh: bool,
}

/// Resultado de un pase de reconciliación
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub car: Car,
    /// Registro de historial a persistir (solo si hubo chequeo)
    pub history_record: Option<HistoryRecord>,
    /// Documento candidato completo, reutilizable por el protocolo de
    /// escritura para recomputar el merge contra una base fresca
    pub candidate: Option<Value>,
    pub enriched: bool,
    pub mot_source: Option<MotDataSource>,
}

/// Campos que el merge de candidatos nunca toca
const MERGE_EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "version",
    "created_at",
    "updated_at",
    "status",
    "registration",
    "user_edited_fields",
];

/// Mergear un documento candidato sobre un anuncio existente.
///
/// Cada campo del candidato pasa por la política de protección; solo se
/// aplican los que la superan. El orden de aplicación no importa: la
/// decisión por campo es independiente.
pub fn merge_candidate(car: &Car, candidate: &Value) -> AppResult<Car> {
    let candidate_map = match candidate.as_object() {
        Some(map) => map,
        None => return Ok(car.clone()),
    };

    let mut doc = car.to_document()?;
    if let Some(doc_map) = doc.as_object_mut() {
        for (field, value) in candidate_map {
            if MERGE_EXCLUDED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            // Un candidato vacío nunca entra al documento: la ausencia se
            // conserva como ausencia, no como string en blanco
            if is_empty_value(value) {
                continue;
            }
            let current = doc_map.get(field);
            if should_apply(&car.user_edited_fields, field, current, value) {
                doc_map.insert(field.clone(), value.clone());
            }
        }
    }

    let mut merged = Car::from_document(doc)?;
    merged.updated_at = Utc::now();
    evaluate_status(&mut merged);
    Ok(merged)
}

/// Reevaluar el estado del anuncio tras cualquier cambio.
///
/// El anuncio avanza solo a `active` en cuanto precio, foto y contacto están
/// presentes a la vez; un draft con contenido parcial pasa a `incomplete`.
pub fn evaluate_status(car: &mut Car) {
    if car.status.is_terminal() {
        return;
    }

    if car.meets_active_requirements() {
        if car.status.can_transition(CarStatus::Active) {
            car.status = CarStatus::Active;
        }
        return;
    }

    if car.status == CarStatus::Draft {
        let has_partial_content = car.price.is_some()
            || !car.photos.is_empty()
            || car.seller_contact.email.is_some()
            || car.seller_contact.phone.is_some();
        if has_partial_content {
            car.status = CarStatus::Incomplete;
        }
    }
}

/// Decidir si este pase debe llamar a los proveedores externos.
///
/// En creación: matrícula presente y chequeo pendiente. En update: solo con
/// refresh explícito, nunca en background (evita pisar ediciones del usuario
/// con refrescos desfasados).
pub fn should_refresh(car: &Car, options: &ReconcileOptions) -> bool {
    if options.skip_enrichment {
        return false;
    }
    if car.registration.is_none() {
        return false;
    }
    if options.force_refresh {
        return true;
    }
    car.history_check_status == HistoryCheckStatus::Pending
}

pub struct ReconciliationEngine {
    enrichment: EnrichmentService,
}

impl ReconciliationEngine {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            enrichment: EnrichmentService::new(config),
        }
    }

    /// Ejecutar un pase de reconciliación sobre el anuncio.
    ///
    /// El fallo del enriquecimiento nunca es fatal: el anuncio sale con
    /// `history_check_status = failed` y el chequeo puede reintentarse más
    /// tarde vía refresh explícito.
    pub async fn reconcile(&self, car: &Car, options: &ReconcileOptions) -> AppResult<ReconcileOutcome> {
        if !should_refresh(car, options) {
            let mut unchanged = car.clone();
            evaluate_status(&mut unchanged);
            return Ok(ReconcileOutcome {
                car: unchanged,
                history_record: None,
                candidate: None,
                enriched: false,
                mot_source: None,
            });
        }

        // should_refresh garantiza que hay matrícula
        let registration = car.registration.clone().unwrap_or_default();

        match self.enrichment.enrich(&registration, car.mileage).await {
            Ok(result) => {
                // Solo un chequeo completo con todos los campos requeridos
                // cuenta como verificado
                let check_status = if result.history_data.check_status == CheckStatus::Success
                    && result.missing_required_fields.is_empty()
                {
                    HistoryCheckStatus::Verified
                } else {
                    HistoryCheckStatus::Failed
                };

                let record = HistoryRecord::from_check(
                    &registration,
                    result.history_data,
                    Some("vehicledata".to_string()),
                    self.enrichment.client().test_mode(),
                );

                // El estado del chequeo y el enlace al registro viajan dentro
                // del candidato, así sobreviven a un re-merge del protocolo
                // de escritura
                let mut candidate = result.candidate;
                if let Some(map) = candidate.as_object_mut() {
                    let status_value = serde_json::to_value(check_status).map_err(|e| {
                        AppError::Internal(format!("Error serializing check status: {}", e))
                    })?;
                    map.insert("history_check_status".to_string(), status_value);
                    map.insert(
                        "history_record_id".to_string(),
                        Value::String(record.id.to_string()),
                    );
                }

                let merged = merge_candidate(car, &candidate)?;

                Ok(ReconcileOutcome {
                    car: merged,
                    history_record: Some(record),
                    candidate: Some(candidate),
                    enriched: true,
                    mot_source: Some(result.mot_source),
                })
            }
            Err(e) => {
                // Se loguea una sola vez aquí, en la frontera
                log::error!("❌ Enrichment failed for {}: {}", registration, e);
                let mut failed = car.clone();
                failed.history_check_status = HistoryCheckStatus::Failed;
                evaluate_status(&mut failed);
                Ok(ReconcileOutcome {
                    car: failed,
                    history_record: None,
                    candidate: None,
                    enriched: false,
                    mot_source: None,
                })
            }
        }
    }
}
