//! # Drive I/O Module
//!
//! This module provides a unified sensor and actuator interface for the drive, which can abstract
//! over the real motor controllers and gyro or the drivetrain simulator. Consumers of
//! [`SensorData`] cannot tell which one produced it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`DriveIo`] implementation for real hardware behind a [`DriveHal`].
pub mod real;

/// [`DriveIo`] implementation backed by the drivetrain simulator.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    drive_sim::DriveSimError,
    kinematics::{Pose, WheelSpeeds},
};

pub use real::{DriveHal, EncoderConversion, RealSensors};
pub use sim::SimulatedSensors;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Sensor and actuator strategy used by the drive base.
pub trait DriveIo: Send {
    /// Read the current sensor values.
    fn read(&mut self) -> SensorData;

    /// Command the voltage applied to each side of the drive. Positive
    /// voltages drive that side forwards.
    fn set_voltages(&mut self, voltages: WheelSpeeds);

    /// Zero both encoder distances.
    fn reset_encoders(&mut self);

    /// Zero the gyro heading.
    fn zero_gyro(&mut self);

    fn set_neutral_mode(&mut self, mode: NeutralMode);

    /// Advance any simulated hardware by `dt` seconds.
    fn step(&mut self, _dt: f64) -> Result<(), DriveIoError> {
        Ok(())
    }

    /// Total current drawn by the drive, if it can be measured.
    fn current_draw_amps(&self) -> Option<f64> {
        None
    }

    /// The true pose of the robot, only known in simulation.
    fn true_pose(&self) -> Option<Pose> {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sensor readings in SI units.
///
/// Distances are cumulative since the encoders were last reset.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct SensorData {
    /// Heading since the gyro was last zeroed, anticlockwise positive.
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Anticlockwise positive, radians/second
    pub turn_rate_rads: f64,

    /// Units: meters
    pub left_distance_m: f64,

    /// Units: meters
    pub right_distance_m: f64,

    /// Units: meters/second
    pub wheel_speeds: WheelSpeeds,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Behaviour of the motors when no voltage is applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeutralMode {
    Brake,
    Coast,
}

#[derive(Debug, thiserror::Error)]
pub enum DriveIoError {
    #[error("Simulator error: {0}")]
    SimError(#[from] DriveSimError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NeutralMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            NeutralMode::Brake => NeutralMode::Coast,
            NeutralMode::Coast => NeutralMode::Brake,
        }
    }
}

impl Default for NeutralMode {
    fn default() -> Self {
        NeutralMode::Brake
    }
}
