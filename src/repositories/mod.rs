//! Repositorios de persistencia
//!
//! Acceso a datos detrás de traits para que el protocolo de escritura
//! concurrente sea testeable sin base de datos.

pub mod car_repository;
pub mod history_repository;

pub use car_repository::{CarRepository, CarStore};
pub use history_repository::{HistoryRepository, HistoryStore};
