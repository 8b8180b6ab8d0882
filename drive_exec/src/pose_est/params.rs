//! Pose estimation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::PoseEstError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the pose estimator
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Vision measurements with a confidence below this value are dropped.
    ///
    /// Range: [0, 1]
    pub vision_confidence_threshold: f64,

    /// Length of the odometry history kept for latency compensation. Vision
    /// measurements older than this are dropped.
    ///
    /// Units: seconds
    pub history_window_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a usable estimator.
    pub fn validate(&self) -> Result<(), PoseEstError> {
        if !(0.0..=1.0).contains(&self.vision_confidence_threshold) {
            return Err(PoseEstError::InvalidConfidenceThreshold(
                self.vision_confidence_threshold,
            ));
        }

        if !(self.history_window_s.is_finite() && self.history_window_s > 0.0) {
            return Err(PoseEstError::InvalidHistoryWindow(self.history_window_s));
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            vision_confidence_threshold: 0.7,
            history_window_s: 1.5,
        }
    }
}
