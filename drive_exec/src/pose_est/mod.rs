//! # Pose estimation module
//!
//! The pose estimator fuses wheel odometry with latency stamped vision
//! measurements into a single estimate of the robot's pose.
//!
//! Odometry is integrated every control cycle from the heading and the two
//! cumulative wheel distances. Each odometry pose is kept in a short,
//! time-ordered history. When a vision measurement arrives its timestamp is
//! used to look up (interpolating where needed) where odometry thought the
//! robot was at that instant. The rigid transform between that odometry pose
//! and the vision pose becomes the correction, which is applied on top of
//! all later odometry poses until a newer measurement replaces it.
//!
//! Looking the odometry pose up at the measurement's timestamp, rather than
//! using the latest one, is what compensates for the latency of the vision
//! pipeline: a frame captured 200 ms ago is compared against where the robot
//! was 200 ms ago.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::kinematics::Pose;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A raw odometry reading.
///
/// Distances are cumulative since the encoders were last reset.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OdometrySample {
    /// Heading reported by the gyro, anticlockwise positive.
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Units: meters
    pub left_distance_m: f64,

    /// Units: meters
    pub right_distance_m: f64,
}

/// A pose measurement from the vision system.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionMeasurement {
    /// The measured pose of the robot
    pub pose: Pose,

    /// The instant the measurement is valid at, on the same clock as the
    /// odometry updates.
    pub timestamp_s: f64,

    /// Confidence in the measurement in [0, 1]
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors when constructing the estimator.
#[derive(Debug, thiserror::Error)]
pub enum PoseEstError {
    #[error("The vision confidence threshold must be in [0, 1], found {0}")]
    InvalidConfidenceThreshold(f64),

    #[error("The odometry history window must be positive, found {0} s")]
    InvalidHistoryWindow(f64),
}

/// What happened to a vision measurement passed to the estimator.
///
/// Rejections are normal operation (the estimator keeps tracking on
/// odometry alone), so they are not errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum VisionOutcome {
    /// The measurement replaced the current correction.
    Applied,

    /// Confidence was below the acceptance threshold.
    LowConfidence,

    /// The measurement contained non-finite values or a confidence outside
    /// [0, 1].
    Invalid,

    /// No odometry has been recorded yet so there is nothing to correct.
    NoOdometry,

    /// The measurement is older than all buffered odometry.
    Stale,

    /// The measurement is not newer than the correction already applied.
    Superseded,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OdometrySample {
    pub fn new(heading_rad: f64, left_distance_m: f64, right_distance_m: f64) -> Self {
        Self {
            heading_rad,
            left_distance_m,
            right_distance_m,
        }
    }
}

impl VisionMeasurement {
    pub fn new(pose: Pose, timestamp_s: f64, confidence: f64) -> Self {
        Self {
            pose,
            timestamp_s,
            confidence,
        }
    }

    /// True if every field is finite and the confidence is in [0, 1].
    pub fn is_well_formed(&self) -> bool {
        self.pose.x().is_finite()
            && self.pose.y().is_finite()
            && self.pose.heading().is_finite()
            && self.timestamp_s.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }
}
