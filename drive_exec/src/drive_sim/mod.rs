//! # Drivetrain simulator
//!
//! Linear model of a differential drivetrain, used in place of the real
//! motors and sensors when running without hardware.
//!
//! The plant is a pair of first-order wheel velocity systems coupled through
//! the chassis. Rewritten in terms of the mean and half-difference of the
//! two wheel velocities it separates into independent linear and angular
//! modes, each of which is discretised exactly for whatever `dt` is passed
//! to `update`. There is no fixed internal step so late or irregular cycles
//! are integrated correctly.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod motor;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use motor::{DcMotor, MotorKind, MotorSpec};
pub use params::{Params, PlantParams};
pub use state::DrivetrainSimulator;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Integrated state of the simulated drivetrain.
///
/// Wheel positions are cumulative distances travelled, heading is wrapped
/// into (-pi, pi].
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationState {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub left_position_m: f64,
    pub left_velocity_ms: f64,
    pub right_position_m: f64,
    pub right_velocity_ms: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DriveSimError {
    #[error("Invalid motor specification {0:?} with {1} motors per side")]
    InvalidMotor(MotorSpec, u32),

    #[error("Invalid drivetrain geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid plant: {0}")]
    InvalidPlant(String),

    #[error("The supply voltage must be positive and finite, found {0} V")]
    InvalidSupplyVoltage(f64),

    #[error("Cannot step the simulation by {0} s")]
    InvalidTimeStep(f64),
}
