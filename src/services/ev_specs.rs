//! Tabla de especificaciones de vehículos eléctricos
//!
//! Lookup best-effort por (marca, modelo) para cuando el proveedor no
//! resuelve las especificaciones EV. Los datos viven aquí como tabla aislada
//! detrás del servicio de enriquecimiento, sin tocar la lógica de merge.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::models::car::ElectricSpecs;

/// Entrada de la tabla de especificaciones conocidas
#[derive(Debug, Clone)]
pub struct EvSpecEntry {
    pub range_miles: f64,
    pub battery_capacity_kwh: f64,
    pub home_charge_time_hours: f64,
    pub rapid_charge_time_minutes: f64,
    pub max_charge_speed_kw: f64,
    pub motor_power_bhp: f64,
    pub motor_torque_nm: f64,
    pub charging_port_type: &'static str,
}

impl EvSpecEntry {
    pub fn to_specs(&self) -> ElectricSpecs {
        ElectricSpecs {
            range_miles: Some(self.range_miles),
            battery_capacity_kwh: Some(self.battery_capacity_kwh),
            home_charge_time_hours: Some(self.home_charge_time_hours),
            rapid_charge_time_minutes: Some(self.rapid_charge_time_minutes),
            max_charge_speed_kw: Some(self.max_charge_speed_kw),
            motor_power_bhp: Some(self.motor_power_bhp),
            motor_torque_nm: Some(self.motor_torque_nm),
            charging_port_type: Some(self.charging_port_type.to_string()),
        }
    }
}

lazy_static! {
    static ref EV_SPEC_TABLE: HashMap<(&'static str, &'static str), EvSpecEntry> = {
        let mut table = HashMap::new();
        table.insert(
            ("nissan", "leaf"),
            EvSpecEntry {
                range_miles: 168.0,
                battery_capacity_kwh: 40.0,
                home_charge_time_hours: 7.5,
                rapid_charge_time_minutes: 60.0,
                max_charge_speed_kw: 50.0,
                motor_power_bhp: 148.0,
                motor_torque_nm: 320.0,
                charging_port_type: "CHAdeMO",
            },
        );
        table.insert(
            ("tesla", "model 3"),
            EvSpecEntry {
                range_miles: 305.0,
                battery_capacity_kwh: 60.0,
                home_charge_time_hours: 8.5,
                rapid_charge_time_minutes: 27.0,
                max_charge_speed_kw: 170.0,
                motor_power_bhp: 283.0,
                motor_torque_nm: 420.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("tesla", "model y"),
            EvSpecEntry {
                range_miles: 283.0,
                battery_capacity_kwh: 60.0,
                home_charge_time_hours: 8.5,
                rapid_charge_time_minutes: 27.0,
                max_charge_speed_kw: 170.0,
                motor_power_bhp: 295.0,
                motor_torque_nm: 420.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("renault", "zoe"),
            EvSpecEntry {
                range_miles: 239.0,
                battery_capacity_kwh: 52.0,
                home_charge_time_hours: 9.5,
                rapid_charge_time_minutes: 70.0,
                max_charge_speed_kw: 50.0,
                motor_power_bhp: 134.0,
                motor_torque_nm: 245.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("bmw", "i3"),
            EvSpecEntry {
                range_miles: 182.0,
                battery_capacity_kwh: 42.2,
                home_charge_time_hours: 6.5,
                rapid_charge_time_minutes: 42.0,
                max_charge_speed_kw: 50.0,
                motor_power_bhp: 168.0,
                motor_torque_nm: 250.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("volkswagen", "id.3"),
            EvSpecEntry {
                range_miles: 263.0,
                battery_capacity_kwh: 58.0,
                home_charge_time_hours: 9.0,
                rapid_charge_time_minutes: 35.0,
                max_charge_speed_kw: 120.0,
                motor_power_bhp: 201.0,
                motor_torque_nm: 310.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("kia", "e-niro"),
            EvSpecEntry {
                range_miles: 282.0,
                battery_capacity_kwh: 64.0,
                home_charge_time_hours: 9.5,
                rapid_charge_time_minutes: 54.0,
                max_charge_speed_kw: 77.0,
                motor_power_bhp: 201.0,
                motor_torque_nm: 395.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("hyundai", "kona electric"),
            EvSpecEntry {
                range_miles: 300.0,
                battery_capacity_kwh: 64.0,
                home_charge_time_hours: 9.5,
                rapid_charge_time_minutes: 47.0,
                max_charge_speed_kw: 77.0,
                motor_power_bhp: 201.0,
                motor_torque_nm: 395.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("mg", "zs ev"),
            EvSpecEntry {
                range_miles: 198.0,
                battery_capacity_kwh: 51.1,
                home_charge_time_hours: 7.5,
                rapid_charge_time_minutes: 40.0,
                max_charge_speed_kw: 76.0,
                motor_power_bhp: 174.0,
                motor_torque_nm: 280.0,
                charging_port_type: "CCS",
            },
        );
        table.insert(
            ("jaguar", "i-pace"),
            EvSpecEntry {
                range_miles: 292.0,
                battery_capacity_kwh: 90.0,
                home_charge_time_hours: 12.75,
                rapid_charge_time_minutes: 60.0,
                max_charge_speed_kw: 104.0,
                motor_power_bhp: 394.0,
                motor_torque_nm: 696.0,
                charging_port_type: "CCS",
            },
        );
        table
    };
}

/// Buscar especificaciones conocidas por marca y modelo (case-insensitive)
pub fn lookup(make: &str, model: &str) -> Option<EvSpecEntry> {
    let make = make.trim().to_lowercase();
    let model = model.trim().to_lowercase();
    EV_SPEC_TABLE
        .iter()
        .find(|((table_make, table_model), _)| *table_make == make && *table_model == model)
        .map(|(_, entry)| entry.clone())
}

/// Defaults genéricos plausibles cuando no hay entrada en la tabla.
/// Solo se aplican a vehículos eléctricos, nunca a otros combustibles.
pub fn generic_defaults() -> ElectricSpecs {
    ElectricSpecs {
        range_miles: Some(150.0),
        battery_capacity_kwh: Some(40.0),
        home_charge_time_hours: Some(8.0),
        rapid_charge_time_minutes: Some(60.0),
        max_charge_speed_kw: Some(50.0),
        motor_power_bhp: Some(130.0),
        motor_torque_nm: Some(250.0),
        charging_port_type: Some("Type 2 / CCS".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        let entry = lookup("Nissan", "LEAF").expect("known entry");
        assert_eq!(entry.battery_capacity_kwh, 40.0);
        assert_eq!(lookup("TESLA", " Model 3 ").unwrap().charging_port_type, "CCS");
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("Fiat", "Multipla").is_none());
    }

    #[test]
    fn test_generic_defaults_fully_populated() {
        let specs = generic_defaults();
        assert!(specs.range_miles.is_some());
        assert!(specs.battery_capacity_kwh.is_some());
        assert!(specs.charging_port_type.is_some());
    }
}
