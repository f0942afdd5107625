//! Services module
//!
//! Este módulo contiene la lógica de negocio y servicios de la aplicación:
//! el pipeline de enriquecimiento de vehículos, la política de protección de
//! datos, el motor de reconciliación y el protocolo de escritura concurrente.

pub mod concurrent_update;
pub mod data_protection;
pub mod enrichment_service;
pub mod ev_specs;
pub mod history_client;
pub mod reconciliation_service;
pub mod response_parser;

pub use concurrent_update::ConcurrentUpdateProtocol;
pub use enrichment_service::EnrichmentService;
pub use history_client::HistoryApiClient;
pub use reconciliation_service::ReconciliationEngine;
