//! Reference trajectories

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::path::Path;

// Internal
use crate::kinematics::Pose;
use util::maths::lerp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One sample of a precomputed reference trajectory.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryState {
    /// Time since the start of the trajectory.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Reference pose in the world frame
    pub pose: Pose,

    /// Units: meters/second
    pub velocity_ms: f64,

    /// Units: meters/second^2
    pub acceleration_mss: f64,

    /// Units: radians/meter
    pub curvature_radpm: f64,
}

/// An ordered, non-empty sequence of trajectory states with strictly
/// increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<TrajectoryState>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error("A trajectory must contain at least one state")]
    Empty,

    #[error("State {0} contains non-finite values")]
    NonFinite(usize),

    #[error("State {0} is not later than the state before it")]
    NonIncreasingTime(usize),

    #[error("Could not read the trajectory file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Could not parse the trajectory: {0}")]
    ParseError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    pub fn new(states: Vec<TrajectoryState>) -> Result<Self, TrajectoryError> {
        if states.is_empty() {
            return Err(TrajectoryError::Empty);
        }

        for (i, s) in states.iter().enumerate() {
            if !s.is_finite() {
                return Err(TrajectoryError::NonFinite(i));
            }
            if i > 0 && s.time_s <= states[i - 1].time_s {
                return Err(TrajectoryError::NonIncreasingTime(i));
            }
        }

        Ok(Self { states })
    }

    /// Parse a trajectory from a JSON array of states.
    pub fn from_json_str(json: &str) -> Result<Self, TrajectoryError> {
        let states: Vec<TrajectoryState> =
            serde_json::from_str(json).map_err(TrajectoryError::ParseError)?;

        Self::new(states)
    }

    /// Load a trajectory from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrajectoryError> {
        let json = std::fs::read_to_string(path).map_err(TrajectoryError::FileLoadError)?;

        Self::from_json_str(&json)
    }

    pub fn states(&self) -> &[TrajectoryState] {
        &self.states
    }

    /// Time of the final state.
    pub fn total_time_s(&self) -> f64 {
        self.states[self.states.len() - 1].time_s
    }

    pub fn initial_pose(&self) -> Pose {
        self.states[0].pose
    }

    /// Sample the trajectory at `time_s`, interpolating between the
    /// neighbouring states. Times outside the trajectory give the first or
    /// last state.
    pub fn sample(&self, time_s: f64) -> TrajectoryState {
        let first = &self.states[0];
        let last = &self.states[self.states.len() - 1];

        if !(time_s > first.time_s) {
            return *first;
        }
        if time_s >= last.time_s {
            return *last;
        }

        // Index of the first state strictly after time_s, at least 1 given
        // the checks above
        let idx = self.states.partition_point(|s| s.time_s <= time_s);
        let prev = &self.states[idx - 1];
        let next = &self.states[idx];

        prev.interpolate(next, (time_s - prev.time_s) / (next.time_s - prev.time_s))
    }
}

impl TrajectoryState {
    fn is_finite(&self) -> bool {
        self.time_s.is_finite()
            && self.pose.x().is_finite()
            && self.pose.y().is_finite()
            && self.pose.heading().is_finite()
            && self.velocity_ms.is_finite()
            && self.acceleration_mss.is_finite()
            && self.curvature_radpm.is_finite()
    }

    /// Interpolate towards `end` by the fraction `t` of the time between them.
    ///
    /// The state is advanced with constant acceleration from this state, and
    /// the pose is placed along the arc to `end` by the fraction of the
    /// distance covered.
    pub fn interpolate(&self, end: &TrajectoryState, t: f64) -> TrajectoryState {
        let time_s = lerp(self.time_s, end.time_s, t);
        let dt = time_s - self.time_s;

        let reversing =
            self.velocity_ms < 0.0 || (self.velocity_ms == 0.0 && self.acceleration_mss < 0.0);

        let velocity_ms = self.velocity_ms + self.acceleration_mss * dt;
        let mut travelled_m = self.velocity_ms * dt + 0.5 * self.acceleration_mss * dt * dt;
        if reversing {
            travelled_m = -travelled_m;
        }

        let span_m = self.pose.distance_to(&end.pose);
        let frac = if span_m > 1e-9 { travelled_m / span_m } else { t };

        TrajectoryState {
            time_s,
            pose: self.pose.interpolate(&end.pose, frac),
            velocity_ms,
            acceleration_mss: self.acceleration_mss,
            curvature_radpm: lerp(self.curvature_radpm, end.curvature_radpm, frac),
        }
    }
}
