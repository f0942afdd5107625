//! Controllers de la aplicación
//!
//! Capa de orquestación entre las rutas HTTP y los servicios de dominio.

pub mod car_controller;

pub use car_controller::CarController;
