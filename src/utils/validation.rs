//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! y normalización de matrículas (VRM).

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    // Formato GB actual (AB12 CDE), formato prefix/suffix y dateless antiguos.
    // La validación es deliberadamente laxa: los proveedores aceptan matrículas
    // personalizadas que no siguen el formato estándar.
    static ref VRM_REGEX: Regex = Regex::new(r"^[A-Z0-9]{2,7}$").unwrap();
}

/// Normalizar una matrícula: mayúsculas y sin espacios
pub fn normalize_registration(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Validar el formato de una matrícula (después de normalizar)
pub fn validate_registration(value: &str) -> Result<String, ValidationError> {
    let normalized = normalize_registration(value);

    if normalized.is_empty() {
        let mut error = ValidationError::new("registration_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }

    if !VRM_REGEX.is_match(&normalized) {
        let mut error = ValidationError::new("registration_format");
        error.add_param("value".into(), &normalized);
        return Err(error);
    }

    Ok(normalized)
}

/// Convertir cilindrada en cc a litros (los proveedores mezclan ambas unidades)
pub fn engine_size_to_liters(value: f64) -> f64 {
    if value > 20.0 {
        // Valores por encima de 20 solo tienen sentido como cc
        (value / 1000.0 * 10.0).round() / 10.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_registration() {
        assert_eq!(normalize_registration("ab12 cde"), "AB12CDE");
        assert_eq!(normalize_registration(" LB70 XYZ "), "LB70XYZ");
    }

    #[test]
    fn test_validate_registration_ok() {
        assert_eq!(validate_registration("ab12 cde").unwrap(), "AB12CDE");
        assert_eq!(validate_registration("A1").unwrap(), "A1");
    }

    #[test]
    fn test_validate_registration_rejects_empty_and_symbols() {
        assert!(validate_registration("").is_err());
        assert!(validate_registration("   ").is_err());
        assert!(validate_registration("AB-12!").is_err());
        assert!(validate_registration("ABCDEFGH1").is_err());
    }

    #[test]
    fn test_engine_size_to_liters() {
        assert_eq!(engine_size_to_liters(1998.0), 2.0);
        assert_eq!(engine_size_to_liters(1.6), 1.6);
        assert_eq!(engine_size_to_liters(1598.0), 1.6);
    }
}
