//! Repositorio de anuncios
//!
//! El colaborador de persistencia del núcleo: get por id, update condicional
//! por (id, versión) y búsqueda por filtros. El anuncio se guarda como
//! documento JSONB con columnas extraídas para indexación; el core nunca
//! asume SQL más allá de esta interfaz.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::car_dto::CarFilters;
use crate::models::car::Car;
use crate::utils::errors::{AppError, AppResult};

/// Interfaz del almacén de anuncios.
///
/// Lo único que el protocolo de escritura concurrente necesita del motor de
/// persistencia: lecturas por id y escritura condicional por versión.
#[async_trait]
pub trait CarStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Car>>;

    async fn insert(&self, car: &Car) -> AppResult<()>;

    /// Escritura condicional: aplica el nuevo estado solo si la versión
    /// persistida coincide con `expected_version`. Devuelve false si otra
    /// escritura ganó la carrera (cero filas afectadas).
    async fn conditional_update(&self, car: &Car, expected_version: i32) -> AppResult<bool>;

    async fn find_active_by_registration(&self, registration: &str) -> AppResult<Option<Car>>;

    async fn find_by_filter(&self, filters: &CarFilters) -> AppResult<Vec<Car>>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct CarRepository {
    pool: PgPool,
}

impl CarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn status_text(car: &Car) -> AppResult<String> {
        serde_json::to_value(car.status)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| AppError::Internal("Error serializing car status".to_string()))
    }
}

#[async_trait]
impl CarStore for CarRepository {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Car>> {
        let doc: Option<Value> = sqlx::query_scalar("SELECT doc FROM cars WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        doc.map(Car::from_document).transpose()
    }

    async fn insert(&self, car: &Car) -> AppResult<()> {
        let doc = car.to_document()?;
        let status = Self::status_text(car)?;

        sqlx::query(
            r#"
            INSERT INTO cars (id, registration, status, version, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(car.id)
        .bind(&car.registration)
        .bind(status)
        .bind(car.version)
        .bind(&doc)
        .bind(car.created_at)
        .bind(car.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn conditional_update(&self, car: &Car, expected_version: i32) -> AppResult<bool> {
        let doc = car.to_document()?;
        let status = Self::status_text(car)?;

        let result = sqlx::query(
            r#"
            UPDATE cars
            SET registration = $3, status = $4, version = $5, doc = $6, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(car.id)
        .bind(expected_version)
        .bind(&car.registration)
        .bind(status)
        .bind(car.version)
        .bind(&doc)
        .bind(car.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_active_by_registration(&self, registration: &str) -> AppResult<Option<Car>> {
        let doc: Option<Value> = sqlx::query_scalar(
            "SELECT doc FROM cars WHERE registration = $1 AND status = 'active'",
        )
        .bind(registration)
        .fetch_optional(&self.pool)
        .await?;

        doc.map(Car::from_document).transpose()
    }

    async fn find_by_filter(&self, filters: &CarFilters) -> AppResult<Vec<Car>> {
        let docs: Vec<Value> = sqlx::query_scalar(
            r#"
            SELECT doc FROM cars
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR doc->>'make' ILIKE $2)
              AND ($3::text IS NULL OR doc->>'model' ILIKE $3)
              AND ($4::text IS NULL OR doc->>'fuel_type' = $4)
              AND ($5::int IS NULL OR (doc->>'year')::int >= $5)
              AND ($6::int IS NULL OR (doc->>'year')::int <= $6)
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(&filters.status)
        .bind(&filters.make)
        .bind(&filters.model)
        .bind(&filters.fuel_type)
        .bind(filters.year_from)
        .bind(filters.year_to)
        .bind(filters.limit.unwrap_or(50))
        .bind(filters.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        docs.into_iter().map(Car::from_document).collect()
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cars WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
