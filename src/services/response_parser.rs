//! Parser de respuestas de proveedores externos
//!
//! Convierte payloads crudos de forma impredecible (el shape
//! VehicleRegistration/VehicleHistory y el shape MOT de DVSA) en valores
//! canónicos. Funciones puras, sin I/O: todo acceso anidado degrada a un
//! valor vacío seguro en lugar de fallar.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::history::{
    AccidentDetails, CheckStatus, FinanceDetails, HistoryData, KeeperChange, StolenDetails,
    WriteOffDetails,
};
use crate::models::mot::{MotDefect, MotDefectType, MotTestRecord, MotTestResult};

/// Buscar la primera clave presente entre varias variantes de nombre.
/// Los proveedores mezclan camelCase, PascalCase y minúsculas.
pub(crate) fn pick<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    for key in keys {
        if let Some(value) = map.get(*key) {
            if !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

/// Interpretar un valor como booleano: bool directo, string "true"/"yes",
/// o contador numérico (> 0)
fn as_bool_ish(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let lower = s.trim().to_lowercase();
            lower == "true" || lower == "yes" || lower == "y" || lower == "1"
        }
        Some(Value::Number(n)) => n.as_f64().map(|f| f > 0.0).unwrap_or(false),
        _ => false,
    }
}

fn as_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn as_i32(value: Option<&Value>) -> Option<i32> {
    match value {
        Some(Value::Number(n)) => n.as_i64().map(|i| i as i32),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_date(value: Option<&Value>) -> Option<NaiveDate> {
    let s = as_string(value)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&s, "%d/%m/%Y"))
        .ok()
}

/// Parsear un payload de chequeo de historial al shape canónico.
///
/// Intenta el parse completo; si el payload no tiene estructura reconocible
/// cae al modo parcial (solo booleanos top-level, `check_status = partial`).
pub fn parse_history_response(raw: &Value, registration: &str) -> HistoryData {
    match parse_full(raw, registration) {
        Some(data) => data,
        None => {
            let data = parse_partial(raw, registration);
            log::warn!(
                "Partial history parse for {}: unavailable fields {:?}",
                registration,
                data.unavailable_fields
            );
            data
        }
    }
}

fn parse_full(raw: &Value, registration: &str) -> Option<HistoryData> {
    if !raw.is_object() {
        return None;
    }

    // Sección de historial: puede venir anidada o ser el propio objeto raíz
    let history = pick(raw, &["VehicleHistory", "vehicleHistory", "history"]).unwrap_or(raw);
    let vehicle = pick(raw, &["VehicleRegistration", "vehicleRegistration", "vehicle"]);

    // Sin ninguna sección reconocible no hay parse completo fiable
    if pick(raw, &["VehicleHistory", "vehicleHistory", "history"]).is_none() && vehicle.is_none() {
        return None;
    }

    let vrm = vehicle
        .and_then(|v| as_string(pick(v, &["Vrm", "vrm", "registration"])))
        .or_else(|| as_string(pick(raw, &["Vrm", "vrm"])))
        .or_else(|| Some(registration.to_string()));

    // Siniestro total: el flag del registro O la presencia del objeto detalle
    // valen como señal (cada proveedor usa una convención distinta)
    let write_off_flag = as_bool_ish(pick(
        history,
        &["writeOffRecord", "WriteOffRecord", "writeOffRecordCount", "WriteOffRecordCount"],
    ));
    let write_off_detail = pick(history, &["writeoff", "writeOff", "WriteOff"]);
    let is_written_off = write_off_flag || write_off_detail.is_some();

    // Distinción sensible: sin registro → "none"; registro presente pero sin
    // categoría informada → "unknown", nunca "none"
    let write_off_category = if is_written_off {
        write_off_detail
            .and_then(|d| as_string(pick(d, &["category", "Category", "writeOffCategory"])))
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        "none".to_string()
    };

    let write_off_details = write_off_detail.map(|d| WriteOffDetails {
        status: as_string(pick(d, &["status", "Status"])),
        loss_date: as_date(pick(d, &["lossdate", "lossDate", "LossDate"])),
        category: as_string(pick(d, &["category", "Category", "writeOffCategory"])),
    });

    let accident_flag = as_bool_ish(pick(
        history,
        &["accidentRecord", "AccidentRecord", "accidentRecordCount"],
    ));
    let accident_detail = pick(history, &["accident", "Accident"]);
    let has_accident_history = accident_flag || accident_detail.is_some() || is_written_off;
    let accident_details = if has_accident_history {
        Some(AccidentDetails {
            severity: if is_written_off {
                Some(write_off_category.clone())
            } else {
                accident_detail.and_then(|d| as_string(pick(d, &["severity", "Severity"])))
            },
            description: accident_detail
                .and_then(|d| as_string(pick(d, &["description", "Description"]))),
        })
    } else {
        None
    };

    let stolen_flag = as_bool_ish(pick(
        history,
        &["stolenRecord", "StolenRecord", "stolenRecordCount"],
    ));
    let stolen_detail = pick(history, &["stolen", "Stolen"]);
    let is_stolen = stolen_flag || stolen_detail.is_some();
    let stolen_details = stolen_detail.map(|d| StolenDetails {
        reported_date: as_date(pick(d, &["reporteddate", "reportedDate", "dateReported"])),
        status: as_string(pick(d, &["status", "Status"])),
    });

    let finance_flag = as_bool_ish(pick(
        history,
        &["financeRecord", "FinanceRecord", "financeRecordCount"],
    ));
    let finance_detail = pick(history, &["finance", "Finance"]);
    let has_outstanding_finance = finance_flag || finance_detail.is_some();
    let finance_details = finance_detail.map(|d| FinanceDetails {
        amount: as_f64(pick(d, &["amount", "Amount", "outstandingAmount"])),
        lender: as_string(pick(d, &["lender", "Lender", "financeCompany"])),
        agreement_type: as_string(pick(d, &["type", "Type", "agreementType"])),
    });

    let keeper_changes = pick(history, &["keeperChangesList", "KeeperChangesList", "keeperChanges"])
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .map(|entry| KeeperChange {
                    date: as_date(pick(entry, &["date", "Date", "dateOfTransaction"])),
                    keeper_count: as_i32(pick(
                        entry,
                        &["numberOfPreviousKeepers", "keeperCount", "NumberOfPreviousKeepers"],
                    )),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(HistoryData {
        vrm,
        has_accident_history,
        accident_details,
        is_written_off,
        write_off_category,
        write_off_details,
        is_stolen,
        stolen_details,
        has_outstanding_finance,
        finance_details,
        is_scrapped: as_bool_ish(pick(history, &["scrapped", "Scrapped", "scrappedRecord"])),
        is_imported: as_bool_ish(pick(history, &["imported", "Imported", "importedRecord"])),
        is_exported: as_bool_ish(pick(history, &["exported", "Exported", "exportedRecord"])),
        previous_owners_count: as_i32(pick(
            history,
            &["numberOfPreviousKeepers", "NumberOfPreviousKeepers", "previousOwners"],
        )),
        v5c_certificate_count: as_i32(pick(
            history,
            &["v5cCertificateCount", "V5CCertificateCount"],
        )),
        keeper_changes,
        check_status: CheckStatus::Success,
        unavailable_fields: Vec::new(),
    })
}

/// Parse parcial: extraer solo los booleanos top-level que se encuentren con
/// confianza. El resultado sigue siendo usable, marcado como `partial`.
fn parse_partial(raw: &Value, registration: &str) -> HistoryData {
    let mut data = HistoryData {
        vrm: Some(registration.to_string()),
        check_status: CheckStatus::Partial,
        ..HistoryData::default()
    };

    let mut unavailable = Vec::new();

    match pick(raw, &["writtenOff", "isWrittenOff", "writeOffRecord"]) {
        Some(value) => {
            data.is_written_off = as_bool_ish(Some(value));
            if data.is_written_off {
                data.write_off_category = "unknown".to_string();
            }
        }
        None => unavailable.push("is_written_off".to_string()),
    }

    match pick(raw, &["stolen", "isStolen", "stolenRecord"]) {
        Some(value) => data.is_stolen = as_bool_ish(Some(value)),
        None => unavailable.push("is_stolen".to_string()),
    }

    match pick(raw, &["outstandingFinance", "hasOutstandingFinance", "financeRecord"]) {
        Some(value) => data.has_outstanding_finance = as_bool_ish(Some(value)),
        None => unavailable.push("has_outstanding_finance".to_string()),
    }

    match pick(raw, &["accidentHistory", "hasAccidentHistory", "accidentRecord"]) {
        Some(value) => data.has_accident_history = as_bool_ish(Some(value)),
        None => unavailable.push("has_accident_history".to_string()),
    }

    unavailable.push("previous_owners_count".to_string());
    unavailable.push("keeper_changes".to_string());
    data.unavailable_fields = unavailable;
    data
}

/// Chequeo puro de campos requeridos en el payload crudo.
///
/// Devuelve la lista de campos ausentes; el caller decide si confiar en un
/// resultado `success` que no los trae todos.
pub fn validate_required_fields(raw: &Value) -> Vec<&'static str> {
    let mut missing = Vec::new();

    let history = pick(raw, &["VehicleHistory", "vehicleHistory", "history"]).unwrap_or(raw);
    let vehicle = pick(raw, &["VehicleRegistration", "vehicleRegistration", "vehicle"]);

    let has_vrm = vehicle
        .and_then(|v| pick(v, &["Vrm", "vrm", "registration"]))
        .or_else(|| pick(raw, &["Vrm", "vrm"]))
        .is_some();
    if !has_vrm {
        missing.push("vrm");
    }

    if pick(history, &["accidentRecord", "AccidentRecord", "accident", "hasAccidentHistory"])
        .is_none()
        && pick(history, &["writeOffRecord", "WriteOffRecord", "writeoff", "writeOff"]).is_none()
    {
        missing.push("hasAccidentHistory");
    }

    if pick(history, &["stolenRecord", "StolenRecord", "stolen", "isStolen"]).is_none() {
        missing.push("isStolen");
    }

    if pick(
        history,
        &["financeRecord", "FinanceRecord", "finance", "hasOutstandingFinance"],
    )
    .is_none()
    {
        missing.push("hasOutstandingFinance");
    }

    missing
}

fn parse_mot_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = as_string(value)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&s, "%Y.%m.%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

/// Parsear un payload de historial MOT (shape primario o shape DVSA).
///
/// Solo conserva registros con fecha de inspección; el resultado queda
/// ordenado del más reciente al más antiguo.
pub fn parse_mot_response(raw: &Value) -> Vec<MotTestRecord> {
    let entries: Vec<&Value> = if let Some(array) = raw.as_array() {
        array.iter().collect()
    } else {
        pick(raw, &["motTests", "MotTests", "motHistory"])
            .or_else(|| {
                pick(raw, &["MotHistory", "motHistoryRecords"])
                    .and_then(|h| pick(h, &["RecordList", "recordList"]))
            })
            .and_then(|v| v.as_array())
            .map(|array| array.iter().collect())
            .unwrap_or_default()
    };

    let mut records: Vec<MotTestRecord> = entries
        .into_iter()
        .filter_map(parse_mot_record)
        .collect();

    records.sort_by(|a, b| b.test_date.cmp(&a.test_date));
    records
}

fn parse_mot_record(entry: &Value) -> Option<MotTestRecord> {
    // Sin fecha de inspección el registro no sirve
    let test_date = parse_mot_date(pick(
        entry,
        &["completedDate", "testDate", "CompletedDate", "TestDate"],
    ))?;

    let result_text = as_string(pick(entry, &["testResult", "TestResult", "result"]))
        .unwrap_or_default()
        .to_uppercase();
    let test_result = if result_text == "PASSED" || result_text == "PASS" {
        MotTestResult::Passed
    } else {
        MotTestResult::Failed
    };

    let expiry_date = if test_result == MotTestResult::Passed {
        parse_mot_date(pick(entry, &["expiryDate", "ExpiryDate"]))
    } else {
        // En un fail la fecha de caducidad no aplica
        None
    };

    let odometer_unit = as_string(pick(entry, &["odometerUnit", "OdometerUnit"]))
        .map(|u| u.to_lowercase())
        .filter(|u| u == "mi" || u == "km");

    let defects: Vec<MotDefect> = pick(entry, &["defects", "Defects", "rfrAndComments"])
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|d| {
                    let text = as_string(pick(d, &["text", "Text", "comment"]))?;
                    let type_text = as_string(pick(d, &["type", "Type"]))
                        .unwrap_or_default()
                        .to_uppercase();
                    let defect_type = match type_text.as_str() {
                        "ADVISORY" => MotDefectType::Advisory,
                        "DANGEROUS" => MotDefectType::Dangerous,
                        _ => MotDefectType::Fail,
                    };
                    Some(MotDefect {
                        defect_type,
                        dangerous: defect_type == MotDefectType::Dangerous
                            || as_bool_ish(pick(d, &["dangerous", "Dangerous"])),
                        text,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let advisory_notices = defects
        .iter()
        .filter(|d| d.defect_type == MotDefectType::Advisory)
        .map(|d| d.text.clone())
        .collect();

    Some(MotTestRecord {
        test_date,
        expiry_date,
        test_result,
        odometer_value: as_f64(pick(entry, &["odometerValue", "OdometerValue", "odometer"])),
        odometer_unit,
        defects,
        advisory_notices,
        test_station: as_string(pick(
            entry,
            &["testStation", "TestStation", "testStationName"],
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_off_with_category() {
        let raw = json!({
            "VehicleRegistration": { "Vrm": "AB12CDE" },
            "VehicleHistory": {
                "writeOffRecord": true,
                "writeoff": { "category": "N", "lossdate": "2020-05-15" }
            }
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert!(data.is_written_off);
        assert_eq!(data.write_off_category, "N");
        assert!(data.has_accident_history);
        assert_eq!(
            data.accident_details.as_ref().unwrap().severity.as_deref(),
            Some("N")
        );
        let details = data.write_off_details.unwrap();
        assert_eq!(details.category.as_deref(), Some("N"));
        assert_eq!(
            details.loss_date,
            Some(chrono::NaiveDate::from_ymd_opt(2020, 5, 15).unwrap())
        );
        assert_eq!(data.check_status, CheckStatus::Success);
    }

    #[test]
    fn test_write_off_present_without_category_is_unknown() {
        let raw = json!({
            "VehicleHistory": {
                "writeOffRecord": true
            }
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert!(data.is_written_off);
        // Presente pero sin categoría: "unknown", nunca "none"
        assert_eq!(data.write_off_category, "unknown");
    }

    #[test]
    fn test_no_write_off_record_is_none() {
        let raw = json!({
            "VehicleHistory": {
                "stolenRecord": false
            }
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert!(!data.is_written_off);
        assert_eq!(data.write_off_category, "none");
    }

    #[test]
    fn test_detail_presence_implies_flag() {
        let raw = json!({
            "VehicleHistory": {
                "stolen": { "status": "reported", "reporteddate": "2021-03-01" },
                "finance": { "amount": 4500.0, "lender": "Example Finance", "type": "HP" }
            }
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert!(data.is_stolen);
        assert!(data.has_outstanding_finance);
        assert_eq!(data.finance_details.unwrap().amount, Some(4500.0));
        assert_eq!(data.stolen_details.unwrap().status.as_deref(), Some("reported"));
    }

    #[test]
    fn test_keeper_changes_and_counts() {
        let raw = json!({
            "VehicleHistory": {
                "numberOfPreviousKeepers": 3,
                "v5cCertificateCount": 2,
                "keeperChangesList": [
                    { "date": "2019-01-10", "numberOfPreviousKeepers": 1 },
                    { "date": "2022-06-05", "numberOfPreviousKeepers": 2 }
                ]
            }
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert_eq!(data.previous_owners_count, Some(3));
        assert_eq!(data.v5c_certificate_count, Some(2));
        assert_eq!(data.keeper_changes.len(), 2);
        assert_eq!(data.keeper_changes[1].keeper_count, Some(2));
    }

    #[test]
    fn test_partial_parse_fallback() {
        // Sin sección de historial reconocible: cae a parse parcial
        let raw = json!({
            "writtenOff": true,
            "stolen": false
        });
        let data = parse_history_response(&raw, "AB12CDE");
        assert_eq!(data.check_status, CheckStatus::Partial);
        assert!(data.is_written_off);
        assert_eq!(data.write_off_category, "unknown");
        assert!(!data.is_stolen);
        assert!(data
            .unavailable_fields
            .contains(&"has_outstanding_finance".to_string()));
    }

    #[test]
    fn test_partial_parse_on_garbage() {
        let raw = json!("not an object");
        let data = parse_history_response(&raw, "AB12CDE");
        assert_eq!(data.check_status, CheckStatus::Partial);
        assert!(!data.is_written_off);
        assert_eq!(data.vrm.as_deref(), Some("AB12CDE"));
    }

    #[test]
    fn test_validate_required_fields() {
        let complete = json!({
            "VehicleRegistration": { "Vrm": "AB12CDE" },
            "VehicleHistory": {
                "accidentRecord": false,
                "stolenRecord": false,
                "financeRecord": false
            }
        });
        assert!(validate_required_fields(&complete).is_empty());

        let missing = json!({
            "VehicleHistory": { "stolenRecord": false }
        });
        let result = validate_required_fields(&missing);
        assert!(result.contains(&"vrm"));
        assert!(result.contains(&"hasAccidentHistory"));
        assert!(result.contains(&"hasOutstandingFinance"));
        assert!(!result.contains(&"isStolen"));
    }

    #[test]
    fn test_mot_parse_dvsa_shape() {
        let raw = json!({
            "motTests": [
                {
                    "completedDate": "2022-09-01",
                    "testResult": "FAILED",
                    "expiryDate": "2023-09-01",
                    "odometerValue": 44100,
                    "odometerUnit": "MI",
                    "defects": [
                        { "type": "FAIL", "text": "Brake pad worn below limit" }
                    ]
                },
                {
                    "completedDate": "2023-09-15",
                    "testResult": "PASSED",
                    "expiryDate": "2024-09-14",
                    "odometerValue": 45230,
                    "odometerUnit": "MI",
                    "defects": [
                        { "type": "ADVISORY", "text": "Tyre worn close to legal limit" },
                        { "type": "DANGEROUS", "text": "Brake hose excessively damaged", "dangerous": true }
                    ]
                },
                { "testResult": "PASSED" }
            ]
        });
        let records = parse_mot_response(&raw);
        // El registro sin fecha se descarta; orden más reciente primero
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].test_result, MotTestResult::Passed);
        assert_eq!(records[0].odometer_unit.as_deref(), Some("mi"));
        assert_eq!(records[0].advisory_notices.len(), 1);
        assert_eq!(
            records[0].advisory_notices[0],
            "Tyre worn close to legal limit"
        );
        assert!(records[0].defects.iter().any(|d| d.dangerous));
        // El fail no lleva fecha de caducidad
        assert_eq!(records[1].test_result, MotTestResult::Failed);
        assert!(records[1].expiry_date.is_none());
    }

    #[test]
    fn test_mot_parse_empty_payload() {
        assert!(parse_mot_response(&json!({})).is_empty());
        assert!(parse_mot_response(&json!(null)).is_empty());
    }
}
