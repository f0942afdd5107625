//! Repositorio de chequeos de historial
//!
//! Los HistoryRecord se guardan por auditoría: uno por chequeo, sin control
//! de versión (son datos derivados, no fuente de verdad). La actualización
//! de campos espejo es una escritura secundaria best-effort.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::car::Car;
use crate::models::history::HistoryRecord;
use crate::utils::errors::{AppError, AppResult};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, record: &HistoryRecord) -> AppResult<()>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<HistoryRecord>>;

    /// Copiar al registro enlazado los campos del Car que se espejan
    /// (service history, fecha MOT, plazas, combustible)
    async fn update_mirrored(&self, id: Uuid, car: &Car) -> AppResult<()>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for HistoryRepository {
    async fn insert(&self, record: &HistoryRecord) -> AppResult<()> {
        let doc = serde_json::to_value(record)
            .map_err(|e| AppError::Internal(format!("Error serializing history record: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO history_checks (id, registration, checked_at, doc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id)
        .bind(&record.registration)
        .bind(record.checked_at)
        .bind(&doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<HistoryRecord>> {
        let doc: Option<Value> =
            sqlx::query_scalar("SELECT doc FROM history_checks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        doc.map(|d| {
            serde_json::from_value(d).map_err(|e| {
                AppError::Internal(format!("Error deserializing history record: {}", e))
            })
        })
        .transpose()
    }

    async fn update_mirrored(&self, id: Uuid, car: &Car) -> AppResult<()> {
        let patch = json!({
            "service_history": car.service_history,
            "mot_due": car.mot_due,
            "seats": car.seats,
            "fuel_type": car.fuel_type,
        });

        sqlx::query("UPDATE history_checks SET doc = doc || $2 WHERE id = $1")
            .bind(id)
            .bind(&patch)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM history_checks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
