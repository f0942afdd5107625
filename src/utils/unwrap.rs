//! Desempaquetado de campos de proveedores externos
//!
//! Algunas integraciones etiquetan la procedencia de cada campo y envían
//! `{value, source}` en lugar del escalar directo. Estas funciones normalizan
//! ambas representaciones a escalares tipados, con nulls tolerantes.

use serde_json::Value;

/// Desempaquetar un posible envelope `{value, source}`.
///
/// Null se queda como null; un objeto con clave `value` devuelve el interior;
/// cualquier otro valor pasa sin cambios.
pub fn unwrap_value(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("value").unwrap_or(value),
        _ => value,
    }
}

/// Extraer un número del valor (desempaquetado primero).
///
/// Los números pasan directo; los strings numéricos se parsean como float;
/// cualquier otra cosa es None.
pub fn extract_number(value: Option<&Value>) -> Option<f64> {
    let inner = unwrap_value(value?);
    match inner {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Extraer un string del valor (desempaquetado primero).
///
/// Los strings se recortan (vacío → None); los números se convierten a texto.
pub fn extract_string(value: Option<&Value>) -> Option<String> {
    let inner = unwrap_value(value?);
    match inner {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Devolver el primer candidato cuyo valor desempaquetado no sea null.
///
/// Se usa para elegir entre varios campos posibles para el mismo atributo
/// lógico (p.ej. `electricRange` top-level vs `runningCosts.electricRange`).
pub fn best_of<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a Value> {
    for candidate in candidates {
        if let Some(value) = candidate {
            let inner = unwrap_value(value);
            if !inner.is_null() {
                return Some(inner);
            }
        }
    }
    None
}

/// Desempaquetar recursivamente todos los envelopes `{value}` de un objeto.
///
/// Solo para respuestas planas o poco anidadas: los arrays se dejan
/// estructuralmente intactos.
pub fn deep_unwrap(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.contains_key("value") {
                let inner = map.into_iter().find(|(k, _)| k == "value").map(|(_, v)| v);
                deep_unwrap(inner.unwrap_or(Value::Null))
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, deep_unwrap(v)))
                        .collect(),
                )
            }
        }
        other => other,
    }
}
