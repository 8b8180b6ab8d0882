//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {

    /// Ramsete aggressiveness gain, must be positive
    pub ramsete_b: f64,

    /// Ramsete damping gain, must be in (0, 1)
    pub ramsete_zeta: f64,

    /// Feed-forward static friction voltage
    pub ff_k_s: f64,

    /// Feed-forward velocity gain, volts per (m/s)
    pub ff_k_v: f64,

    /// Feed-forward acceleration gain, volts per (m/s^2)
    pub ff_k_a: f64,

    /// Wheel velocity controller proportional gain
    pub wheel_k_p: f64,

    /// Wheel velocity controller integral gain
    pub wheel_k_i: f64,

    /// Wheel velocity controller derivative gain
    pub wheel_k_d: f64,

    /// Wheel speed targets are scaled down together so neither exceeds this.
    pub max_wheel_speed_ms: f64,

    /// The limit on position error. Above this limit the trajectory will be
    /// aborted.
    pub position_error_limit_m: f64,

    /// The limit on heading error. Above this limit the trajectory will be
    /// aborted.
    pub heading_error_limit_rad: f64,
}
