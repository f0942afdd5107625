//! Protocolo de actualización concurrente
//!
//! Escritura segura bajo escritores concurrentes con concurrencia optimista:
//! cada escritura presenta la versión leída y la incrementa en exactamente 1.
//! Si la escritura condicional no coincide (la versión cambió por debajo),
//! se recarga el estado fresco, se recomputa el update parcial y se reintenta
//! con backoff, hasta un tope de intentos.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::car::{Car, CarStatus};
use crate::repositories::{CarStore, HistoryStore};
use crate::services::data_protection::{is_protected_field, mark_user_edited};
use crate::services::reconciliation_service::{evaluate_status, merge_candidate};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::retry::Backoff;

/// Campos de bookkeeping interno que nunca entran en el field-set escrito.
/// Se eliminan de todo payload entrante para evitar corromper identidad,
/// versión o los metadatos de protección desde el cliente: el conjunto de
/// campos editados solo cambia vía `mark_user_edited`.
pub const BOOKKEEPING_FIELDS: &[&str] = &[
    "id",
    "version",
    "created_at",
    "updated_at",
    "user_edited_fields",
];

/// Campos que se espejan en el HistoryRecord enlazado tras la escritura
/// primaria
const MIRRORED_FIELDS: &[&str] = &["service_history", "mot_due", "seats", "fuel_type"];

const MAX_ATTEMPTS: u32 = 3;

pub struct ConcurrentUpdateProtocol {
    store: Arc<dyn CarStore>,
    history: Arc<dyn HistoryStore>,
}

impl ConcurrentUpdateProtocol {
    pub fn new(store: Arc<dyn CarStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { store, history }
    }

    /// Aplicar un update parcial de usuario sobre el anuncio.
    ///
    /// Los campos protegidos que llegan explícitamente en la request quedan
    /// marcados como editados por el usuario antes de aplicarse.
    pub async fn apply_update(
        &self,
        id: Uuid,
        expected_version: i32,
        fields: Map<String, Value>,
    ) -> AppResult<Car> {
        let fields = strip_bookkeeping(fields);

        let updated = self
            .write_with_retry(id, expected_version, |current| {
                apply_user_fields(current, &fields)
            })
            .await?;

        let touches_mirrored = fields.keys().any(|k| MIRRORED_FIELDS.contains(&k.as_str()));
        if touches_mirrored {
            self.mirror_to_history(&updated).await;
        }

        Ok(updated)
    }

    /// Aplicar un candidato de enriquecimiento sobre el anuncio.
    ///
    /// En cada intento el merge (y con él la política de protección) se
    /// recomputa contra la base fresca, no contra el snapshot original.
    pub async fn apply_reconciled(
        &self,
        id: Uuid,
        expected_version: i32,
        candidate: &Value,
    ) -> AppResult<Car> {
        self.write_with_retry(id, expected_version, |current| {
            merge_candidate(current, candidate)
        })
        .await
    }

    /// Núcleo del protocolo: bucle acotado de (cargar, recomputar, escribir
    /// condicional).
    async fn write_with_retry<F>(
        &self,
        id: Uuid,
        expected_version: i32,
        recompute: F,
    ) -> AppResult<Car>
    where
        F: Fn(&Car) -> AppResult<Car>,
    {
        let backoff = Backoff::Linear(Duration::from_millis(100));

        for attempt in 1..=MAX_ATTEMPTS {
            let current = self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Car with id '{}' not found", id)))?;

            // El primer intento honra la versión que presentó el caller;
            // los reintentos van contra el estado recargado
            let target_version = if attempt == 1 {
                expected_version
            } else {
                current.version
            };

            let mut updated = recompute(&current)?;
            updated.version = target_version + 1;

            if self.store.conditional_update(&updated, target_version).await? {
                return Ok(updated);
            }

            log::warn!(
                "Version conflict updating car {} (attempt {}/{}, presented v{})",
                id,
                attempt,
                MAX_ATTEMPTS,
                target_version
            );

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(backoff.delay_for(attempt)).await;
            }
        }

        Err(AppError::ConcurrentModification(format!(
            "Update of car '{}' lost {} version races",
            id, MAX_ATTEMPTS
        )))
    }

    /// Escritura secundaria best-effort: el fallo se loguea y se traga,
    /// nunca falla ni revierte la escritura primaria.
    async fn mirror_to_history(&self, car: &Car) {
        let record_id = match car.history_record_id {
            Some(record_id) => record_id,
            None => return,
        };

        if let Err(e) = self.history.update_mirrored(record_id, car).await {
            log::warn!(
                "⚠️ Mirrored history update failed for car {} (record {}): {}",
                car.id,
                record_id,
                e
            );
        }
    }
}

/// Eliminar campos de bookkeeping del payload entrante
pub fn strip_bookkeeping(mut fields: Map<String, Value>) -> Map<String, Value> {
    for field in BOOKKEEPING_FIELDS {
        if fields.remove(*field).is_some() {
            log::debug!("Stripped bookkeeping field '{}' from update payload", field);
        }
    }
    fields
}

/// Aplicar campos de usuario sobre el estado actual.
///
/// Un valor que el usuario suministra explícitamente siempre se aplica; si el
/// campo pertenece al conjunto protegido, además queda marcado como editado
/// para que el enriquecimiento no lo pise después. Un cambio de estado
/// pasa por la máquina de estados antes de aplicarse.
fn apply_user_fields(current: &Car, fields: &Map<String, Value>) -> AppResult<Car> {
    if let Some(value) = fields.get("status") {
        let requested: CarStatus = serde_json::from_value(value.clone())
            .map_err(|_| AppError::BadRequest(format!("Unknown status value: {}", value)))?;
        if !current.status.can_transition(requested) {
            return Err(AppError::BadRequest(format!(
                "Cannot change status from {:?} to {:?}",
                current.status, requested
            )));
        }
    }

    let mut doc = current.to_document()?;

    if let Some(doc_map) = doc.as_object_mut() {
        for (field, value) in fields {
            doc_map.insert(field.clone(), value.clone());
        }
    }

    let mut updated = Car::from_document(doc)
        .map_err(|_| AppError::BadRequest("Invalid field value in update payload".to_string()))?;

    for field in fields.keys() {
        if is_protected_field(field) {
            mark_user_edited(&mut updated, field);
        }
    }

    updated.updated_at = chrono::Utc::now();
    evaluate_status(&mut updated);
    Ok(updated)
}
