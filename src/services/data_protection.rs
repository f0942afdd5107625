//! Política de protección de datos en el merge
//!
//! Decide, campo a campo, si un valor candidato recién descargado puede
//! sobreescribir el valor persistido. Las ediciones del usuario siempre
//! ganan y los datos presentes nunca se reemplazan por ausencia.

use serde_json::Value;

use crate::models::car::Car;

/// Campos que el update marca como editados por el usuario cuando llegan en
/// la request: son los más propensos a ser pisados por re-enriquecimientos
/// con datos desfasados.
pub const PROTECTED_FIELDS: &[&str] = &["mot_due", "color", "seats", "service_history", "fuel_type"];

/// Verificar si un campo pertenece al conjunto protegido
pub fn is_protected_field(field: &str) -> bool {
    PROTECTED_FIELDS.contains(&field)
}

/// Un valor cuenta como vacío si es null, string en blanco, o
/// colección sin elementos
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Decidir si el candidato puede aplicarse sobre el valor actual.
///
/// Exactamente una de las tres ramas aplica para cada triple:
/// 1. Campo editado por el usuario → false (se salta entero, no se mezcla)
/// 2. Valor actual presente y candidato vacío → false
/// 3. En cualquier otro caso → true
pub fn should_apply(
    user_edited_fields: &[String],
    field: &str,
    current: Option<&Value>,
    candidate: &Value,
) -> bool {
    if user_edited_fields.iter().any(|f| f == field) {
        return false;
    }

    let current_present = current.map(|v| !is_empty_value(v)).unwrap_or(false);
    if current_present && is_empty_value(candidate) {
        return false;
    }

    true
}

/// Añadir un campo al conjunto de editados por el usuario (idempotente)
pub fn mark_user_edited(car: &mut Car, field: &str) {
    if !car.user_edited_fields.iter().any(|f| f == field) {
        car.user_edited_fields.push(field.to_string());
    }
}
