//! # Drive base
//!
//! The drive base owns the drive's sensor and actuator strategy, the pose
//! estimator and trajectory control, and sequences them once per control
//! cycle through `periodic`:
//!
//!  1. Read the sensors
//!  2. Integrate odometry into the pose estimator
//!  3. Drain any pending vision measurements into the estimator
//!  4. Run trajectory control if a trajectory is being followed
//!  5. Apply the demanded voltages
//!  6. Advance simulated hardware by the time elapsed since the last cycle
//!
//! External callers command the drive (voltages, tank or arcade percent
//! outputs, trajectories) and query its telemetry between cycles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod limiter;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::{
    drive_io::{DriveIoError, EncoderConversion},
    kinematics::KinematicsError,
    pose_est::PoseEstError,
    traj_ctrl::{TrajCtrlError, TrajCtrlMode},
};
pub use limiter::SlewRateLimiter;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive telemetry, one record per control cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DriveTm {
    pub time_s: f64,

    /// Fused pose estimate
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,

    /// Odometry-only pose
    pub odom_x_m: f64,
    pub odom_y_m: f64,
    pub odom_heading_rad: f64,

    /// Ground truth, simulation only
    pub true_x_m: Option<f64>,
    pub true_y_m: Option<f64>,
    pub true_heading_rad: Option<f64>,

    pub left_distance_m: f64,
    pub right_distance_m: f64,
    pub left_speed_ms: f64,
    pub right_speed_ms: f64,
    pub left_voltage_v: f64,
    pub right_voltage_v: f64,

    /// Simulation only
    pub current_draw_a: Option<f64>,

    pub traj_mode: TrajCtrlMode,
    pub along_track_error_m: f64,
    pub cross_track_error_m: f64,
    pub traj_heading_error_rad: f64,

    /// Total vision measurements applied and dropped
    pub vision_applied: u64,
    pub vision_dropped: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DriveBaseError {
    #[error("The supply voltage must be positive and finite, found {0} V")]
    InvalidSupplyVoltage(f64),

    #[error("The acceleration rate limit must be positive, found {0}")]
    InvalidRateLimit(f64),

    #[error("Invalid encoder conversion: {0:?}")]
    InvalidEncoderConversion(EncoderConversion),

    #[error("Kinematics error: {0}")]
    KinematicsError(#[from] KinematicsError),

    #[error("Pose estimator error: {0}")]
    PoseEstError(#[from] PoseEstError),

    #[error("Trajectory control error: {0}")]
    TrajCtrlError(#[from] TrajCtrlError),

    #[error("Drive I/O error: {0}")]
    DriveIoError(#[from] DriveIoError),
}
