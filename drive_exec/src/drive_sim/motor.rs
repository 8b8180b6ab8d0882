//! DC motor model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::DriveSimError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Datasheet values of a single DC motor.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct MotorSpec {
    /// Voltage the datasheet values were measured at.
    pub nominal_voltage_v: f64,

    pub stall_torque_nm: f64,

    pub stall_current_a: f64,

    pub free_current_a: f64,

    pub free_speed_rpm: f64,
}

/// A gearbox of identical brushed DC motors, described by its electrical
/// constants.
///
/// All motors in the gearbox are assumed to share the load equally, so the
/// gearbox behaves as a single motor with scaled stall torque and currents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DcMotor {
    pub nominal_voltage_v: f64,
    pub stall_torque_nm: f64,
    pub stall_current_a: f64,
    pub free_current_a: f64,

    /// Units: radians/second
    pub free_speed_rads: f64,

    /// Winding resistance
    pub r_ohms: f64,

    /// Speed constant, radians/second per volt
    pub kv_rads_per_v: f64,

    /// Torque constant, newton meters per amp
    pub kt_nm_per_a: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Motor selection in the parameter file.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotorKind {
    Falcon500,
    Custom(MotorSpec),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotorSpec {
    /// CTRE Falcon 500
    pub const FALCON_500: MotorSpec = MotorSpec {
        nominal_voltage_v: 12.0,
        stall_torque_nm: 4.69,
        stall_current_a: 257.0,
        free_current_a: 1.5,
        free_speed_rpm: 6380.0,
    };
}

impl MotorKind {
    pub fn spec(&self) -> MotorSpec {
        match self {
            MotorKind::Falcon500 => MotorSpec::FALCON_500,
            MotorKind::Custom(s) => *s,
        }
    }
}

impl DcMotor {
    /// Build a gearbox of `num_motors` motors matching `spec`.
    pub fn new(spec: MotorSpec, num_motors: u32) -> Result<Self, DriveSimError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if num_motors == 0
            || !positive(spec.nominal_voltage_v)
            || !positive(spec.stall_torque_nm)
            || !positive(spec.stall_current_a)
            || !positive(spec.free_speed_rpm)
            || !(spec.free_current_a >= 0.0 && spec.free_current_a < spec.stall_current_a)
        {
            return Err(DriveSimError::InvalidMotor(spec, num_motors));
        }

        let n = num_motors as f64;
        let stall_torque_nm = spec.stall_torque_nm * n;
        let stall_current_a = spec.stall_current_a * n;
        let free_current_a = spec.free_current_a * n;
        let free_speed_rads = spec.free_speed_rpm * 2.0 * std::f64::consts::PI / 60.0;

        let r_ohms = spec.nominal_voltage_v / stall_current_a;

        Ok(Self {
            nominal_voltage_v: spec.nominal_voltage_v,
            stall_torque_nm,
            stall_current_a,
            free_current_a,
            free_speed_rads,
            r_ohms,
            kv_rads_per_v: free_speed_rads / (spec.nominal_voltage_v - r_ohms * free_current_a),
            kt_nm_per_a: stall_torque_nm / stall_current_a,
        })
    }

    /// A gearbox of Falcon 500s.
    pub fn falcon_500(num_motors: u32) -> Result<Self, DriveSimError> {
        Self::new(MotorSpec::FALCON_500, num_motors)
    }

    /// Current drawn by the gearbox turning at `speed_rads` with
    /// `voltage_v` applied across it.
    pub fn current_a(&self, speed_rads: f64, voltage_v: f64) -> f64 {
        -speed_rads / (self.kv_rads_per_v * self.r_ohms) + voltage_v / self.r_ohms
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_falcon_constants() {
        let m = DcMotor::falcon_500(1).unwrap();

        // At free speed with nominal voltage only the free current flows
        let i = m.current_a(m.free_speed_rads, m.nominal_voltage_v);
        assert!((i - 1.5).abs() < 1e-9);

        // Stalled with nominal voltage gives the stall current
        assert!((m.current_a(0.0, 12.0) - 257.0).abs() < 1e-9);
    }

    #[test]
    fn test_gearbox_scaling() {
        let one = DcMotor::falcon_500(1).unwrap();
        let two = DcMotor::falcon_500(2).unwrap();

        assert!((two.stall_torque_nm - 2.0 * one.stall_torque_nm).abs() < 1e-12);
        assert!((two.kt_nm_per_a - one.kt_nm_per_a).abs() < 1e-12);
        assert!((two.r_ohms - one.r_ohms / 2.0).abs() < 1e-12);

        assert!(DcMotor::falcon_500(0).is_err());
    }
}
