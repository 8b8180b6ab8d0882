//! Drivetrain simulator parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::motor::MotorKind;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// How the drivetrain dynamics are described
    pub plant: PlantParams,

    /// Motor fitted to each side of the drive
    pub motor: MotorKind,

    /// Number of motors driving each side
    pub motors_per_side: u32,

    /// Motor revolutions per wheel revolution
    pub gearing: f64,

    /// Units: meters
    pub wheel_radius_m: f64,

    /// Units: meters
    pub track_width_m: f64,

    /// Commanded voltages are clamped to +/- this value.
    ///
    /// Units: volts
    pub supply_voltage_v: f64,
}

/// Source of the linear plant.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlantParams {
    /// Gains identified by drive characterisation, linear in volts per
    /// (m/s) and volts per (m/s^2), angular the same per wheel speed.
    Characterised {
        kv_linear: f64,
        ka_linear: f64,
        kv_angular: f64,
        ka_angular: f64,
    },

    /// Physical description of the chassis, driven by the configured motor.
    Physical {
        mass_kg: f64,
        moi_kgm2: f64,
    },
}
