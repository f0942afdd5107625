//! DTOs de la API
//!
//! Requests, responses y filtros que cruzan la frontera HTTP.

pub mod api;
pub mod car_dto;
