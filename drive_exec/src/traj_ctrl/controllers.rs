//! # Trajectory controllers module
//!
//! This module provides the controllers used by TrajCtrl: the Ramsete
//! nonlinear pose feedback, the static motor feed-forward and the PID used to
//! close the loop on each wheel's velocity.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{TrajCtrlError, TrajectoryState};
use crate::kinematics::{ChassisVelocity, Pose};
use util::maths::{sign, sinc};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ramsete unicycle tracking controller.
///
/// Converges to the reference for any trajectory with bounded curvature and
/// velocity as long as `b > 0` and `0 < zeta < 1`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RamseteController {
    /// Aggressiveness of the correction, rad^2/m^2
    b: f64,

    /// Damping, 1/rad
    zeta: f64,
}

/// Static motor feed-forward, `V = kS sign(v) + kV v + kA a`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct SimpleMotorFeedforward {
    pub k_s: f64,
    pub k_v: f64,
    pub k_a: f64,
}

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RamseteController {
    pub fn new(b: f64, zeta: f64) -> Result<Self, TrajCtrlError> {
        if !(b.is_finite() && b > 0.0 && zeta > 0.0 && zeta < 1.0) {
            return Err(TrajCtrlError::InvalidRamseteGains(b, zeta));
        }

        Ok(Self { b, zeta })
    }

    /// Chassis velocity which drives `current` towards `reference`.
    pub fn calculate(&self, current: &Pose, reference: &TrajectoryState) -> ChassisVelocity {
        // Error expressed in the robot's frame
        let error = reference.pose.relative_to(current);
        let (e_x, e_y, e_theta) = (error.x(), error.y(), error.heading());

        let v_ref = reference.velocity_ms;
        let w_ref = reference.velocity_ms * reference.curvature_radpm;

        let k = 2.0 * self.zeta * (w_ref * w_ref + self.b * v_ref * v_ref).sqrt();

        ChassisVelocity {
            linear_ms: v_ref * e_theta.cos() + k * e_x,
            angular_rads: w_ref + k * e_theta + self.b * v_ref * sinc(e_theta) * e_y,
        }
    }
}

impl SimpleMotorFeedforward {
    pub fn new(k_s: f64, k_v: f64, k_a: f64) -> Self {
        Self { k_s, k_v, k_a }
    }

    /// Voltage needed to hold `velocity` while accelerating at
    /// `acceleration`.
    pub fn calculate(&self, velocity: f64, acceleration: f64) -> f64 {
        self.k_s * sign(velocity) + self.k_v * velocity + self.k_a * acceleration
    }
}

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            integral: 0f64,
            prev_error: None
        }
    }

    /// Get the value of the controller for the given error.
    ///
    /// `dt` is the time since the previous call, `None` on the first cycle.
    pub fn get(&mut self, error: f64, dt: Option<f64>) -> f64 {
        // Only valid time steps contribute to the integral and derivative,
        // otherwise the first cycle would produce a large spike.
        let dt = dt.filter(|t| t.is_finite() && *t > 0.0);

        if let Some(t) = dt {
            self.integral += error * t;
        }

        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64
        };

        // Calculate the output
        let out =
            self.k_p * error
            + self.k_i * self.integral
            + self.k_d * deriv;

        // Remember the previous error
        self.prev_error = Some(error);

        out
    }

    /// Clear the integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reference(pose: Pose, velocity_ms: f64, curvature_radpm: f64) -> TrajectoryState {
        TrajectoryState {
            time_s: 0.0,
            pose,
            velocity_ms,
            acceleration_mss: 0.0,
            curvature_radpm,
        }
    }

    #[test]
    fn test_ramsete_gains() {
        assert!(RamseteController::new(2.0, 0.7).is_ok());
        assert!(RamseteController::new(0.0, 0.7).is_err());
        assert!(RamseteController::new(2.0, 1.0).is_err());
        assert!(RamseteController::new(2.0, 0.0).is_err());
    }

    #[test]
    fn test_ramsete_stationary() {
        let ctrl = RamseteController::new(2.0, 0.7).unwrap();
        let pose = Pose::new(1.5, -0.3, 2.0);

        let cmd = ctrl.calculate(&pose, &reference(pose, 0.0, 0.0));

        assert_eq!(cmd, ChassisVelocity::new(0.0, 0.0));
    }

    #[test]
    fn test_ramsete_on_track() {
        let ctrl = RamseteController::new(2.0, 0.7).unwrap();
        let pose = Pose::new(0.0, 0.0, 0.3);

        let cmd = ctrl.calculate(&pose, &reference(pose, 1.2, 0.5));

        assert!((cmd.linear_ms - 1.2).abs() < 1e-12);
        assert!((cmd.angular_rads - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_ramsete_corrections() {
        let ctrl = RamseteController::new(2.0, 0.7).unwrap();

        // Reference ahead: speed up
        let cmd = ctrl.calculate(
            &Pose::identity(),
            &reference(Pose::new(0.2, 0.0, 0.0), 1.0, 0.0)
        );
        assert!(cmd.linear_ms > 1.0);

        // Reference to the left: turn left
        let cmd = ctrl.calculate(
            &Pose::identity(),
            &reference(Pose::new(0.0, 0.2, 0.0), 1.0, 0.0)
        );
        assert!(cmd.angular_rads > 0.0);

        // Reference rotated clockwise: turn right
        let cmd = ctrl.calculate(
            &Pose::identity(),
            &reference(Pose::new(0.0, 0.0, -0.2), 1.0, 0.0)
        );
        assert!(cmd.angular_rads < 0.0);
    }

    #[test]
    fn test_feedforward() {
        let ff = SimpleMotorFeedforward::new(0.86841, 4.009, 2.6045);

        assert_eq!(ff.calculate(0.0, 0.0), 0.0);
        assert!((ff.calculate(1.0, 0.0) - (0.86841 + 4.009)).abs() < 1e-12);
        assert!((ff.calculate(-1.0, 0.0) + (0.86841 + 4.009)).abs() < 1e-12);
        assert!((ff.calculate(0.0, 1.0) - 2.6045).abs() < 1e-12);
    }

    #[test]
    fn test_pid() {
        let mut pid = PidController::new(2.0, 1.0, 0.5);

        // No history on the first call so only the proportional term acts
        assert_eq!(pid.get(1.0, None), 2.0);

        // e = 0.5, integral = 0.05, derivative = -5
        let out = pid.get(0.5, Some(0.1));
        assert!((out - (1.0 + 0.05 - 2.5)).abs() < 1e-12);

        pid.reset();
        assert_eq!(pid.get(1.0, Some(0.1)), 2.0 + 0.1);
    }
}
