//! # Kinematics module
//!
//! Differential drive kinematics, converting between the speeds of the two
//! wheel sides and the velocity of the chassis as a whole, along with the
//! planar geometry types used by the rest of the drive software.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pose;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use pose::{Pose, Twist};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Differential drive kinematics for a fixed track width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KinematicsModel {
    track_width_m: f64,
}

/// Combined velocity of the chassis.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Forward speed, meters/second
    pub linear_ms: f64,

    /// Turn rate, anticlockwise positive, radians/second
    pub angular_rads: f64,
}

/// A value for each side of the drive.
///
/// Units depend on context, either meters/second or volts.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("The track width must be positive and finite, found {0} m")]
    InvalidTrackWidth(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinematicsModel {
    /// Create a new model, rejecting non-positive track widths.
    pub fn new(track_width_m: f64) -> Result<Self, KinematicsError> {
        if !(track_width_m.is_finite() && track_width_m > 0.0) {
            return Err(KinematicsError::InvalidTrackWidth(track_width_m));
        }

        Ok(Self { track_width_m })
    }

    pub fn track_width_m(&self) -> f64 {
        self.track_width_m
    }

    /// Forward kinematics.
    pub fn to_chassis_velocity(&self, wheels: &WheelSpeeds) -> ChassisVelocity {
        ChassisVelocity {
            linear_ms: (wheels.left + wheels.right) / 2.0,
            angular_rads: (wheels.right - wheels.left) / self.track_width_m,
        }
    }

    /// Inverse kinematics.
    pub fn to_wheel_speeds(&self, chassis: &ChassisVelocity) -> WheelSpeeds {
        let half_track_m = self.track_width_m / 2.0;

        WheelSpeeds {
            left: chassis.linear_ms - chassis.angular_rads * half_track_m,
            right: chassis.linear_ms + chassis.angular_rads * half_track_m,
        }
    }

    /// The twist produced by the given wheel travel distances.
    pub fn to_twist(&self, left_delta_m: f64, right_delta_m: f64) -> Twist {
        Twist {
            dx_m: (left_delta_m + right_delta_m) / 2.0,
            dy_m: 0.0,
            dtheta_rad: (right_delta_m - left_delta_m) / self.track_width_m,
        }
    }
}

impl WheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Scale both sides down equally so that neither exceeds `max_abs`,
    /// preserving the ratio between them.
    pub fn desaturate(&self, max_abs: f64) -> WheelSpeeds {
        let largest = self.left.abs().max(self.right.abs());

        if largest > max_abs && largest > 0.0 {
            WheelSpeeds {
                left: self.left / largest * max_abs,
                right: self.right / largest * max_abs,
            }
        }
        else {
            *self
        }
    }

    /// Clamp each side into `[-max_abs, max_abs]` independently.
    pub fn clamp(&self, max_abs: f64) -> WheelSpeeds {
        WheelSpeeds {
            left: util::maths::clamp(self.left, -max_abs, max_abs),
            right: util::maths::clamp(self.right, -max_abs, max_abs),
        }
    }
}

impl ChassisVelocity {
    pub fn new(linear_ms: f64, angular_rads: f64) -> Self {
        Self {
            linear_ms,
            angular_rads,
        }
    }
}
