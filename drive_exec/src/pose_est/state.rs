//! Pose estimator state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use std::collections::VecDeque;

// Internal
use super::*;
use crate::kinematics::{KinematicsModel, Pose, Twist};
use util::maths::wrap_angle;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fuses odometry with vision measurements.
///
/// Exactly one estimator owns the fused pose. It is only mutated through
/// `update`, `add_vision_measurement` and `reset_pose`.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    params: Params,

    kinematics: KinematicsModel,

    /// Pose the odometry was last reset to
    reference_pose: Pose,

    /// Raw reading at the time of the last reset
    reference_odometry: OdometrySample,

    /// Last raw reading that was integrated, `None` until the first update
    /// after a reset.
    prev_odometry: Option<OdometrySample>,

    /// Odometry-only pose, integrated from `reference_pose`
    odometry_pose: Pose,

    /// Time ordered odometry poses covering the history window
    history: VecDeque<HistoryEntry>,

    /// The currently applied vision correction
    correction: Option<Correction>,
}

/// An odometry pose and the time it was valid at.
#[derive(Debug, Copy, Clone)]
struct HistoryEntry {
    timestamp_s: f64,
    pose: Pose,
}

/// A world frame transform which maps odometry poses onto fused poses.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Correction {
    /// Timestamp of the measurement the correction came from
    pub timestamp_s: f64,

    /// `fused = transform * odometry`
    pub transform: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseEstimator {
    /// Create a new estimator starting at `initial_pose` with the sensors
    /// currently reading `initial_odometry`.
    pub fn new(
        params: Params,
        kinematics: KinematicsModel,
        initial_odometry: OdometrySample,
        initial_pose: Pose,
    ) -> Result<Self, PoseEstError> {
        params.validate()?;

        Ok(Self {
            params,
            kinematics,
            reference_pose: initial_pose,
            reference_odometry: initial_odometry,
            prev_odometry: None,
            odometry_pose: initial_pose,
            history: VecDeque::new(),
            correction: None,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Integrate a new odometry reading taken at `timestamp_s` and return the
    /// fused pose.
    pub fn update(&mut self, timestamp_s: f64, odometry: OdometrySample) -> Pose {
        let prev = self.prev_odometry.unwrap_or(self.reference_odometry);

        // Heading comes straight from the gyro, relative to the reading at
        // the last reset.
        let heading_rad = wrap_angle(
            self.reference_pose.heading()
                + (odometry.heading_rad - self.reference_odometry.heading_rad),
        );

        let left_delta_m = odometry.left_distance_m - prev.left_distance_m;
        let right_delta_m = odometry.right_distance_m - prev.right_distance_m;

        let twist = Twist {
            dtheta_rad: wrap_angle(heading_rad - self.odometry_pose.heading()),
            ..self.kinematics.to_twist(left_delta_m, right_delta_m)
        };

        self.odometry_pose = self.odometry_pose.exp(&twist).with_heading(heading_rad);
        self.prev_odometry = Some(odometry);

        self.record_history(timestamp_s);

        self.estimated_pose()
    }

    /// Apply a vision measurement, returning what was done with it.
    pub fn add_vision_measurement(&mut self, measurement: &VisionMeasurement) -> VisionOutcome {
        let outcome = self.try_apply_vision(measurement);

        match outcome {
            VisionOutcome::Applied => debug!(
                "Vision correction applied from t = {:.3} s: {}",
                measurement.timestamp_s, measurement.pose
            ),
            other => trace!(
                "Vision measurement at t = {:.3} s dropped: {:?}",
                measurement.timestamp_s, other
            ),
        }

        outcome
    }

    /// Reset the estimate to `pose`.
    ///
    /// `odometry` must be the raw reading at the instant of the reset. If the
    /// caller zeroes the encoders or gyro as part of the reset it must do so
    /// before taking this reading, so that the baseline and the reference
    /// pose change together.
    pub fn reset_pose(&mut self, pose: Pose, odometry: OdometrySample) {
        self.reference_pose = pose;
        self.reference_odometry = odometry;
        self.prev_odometry = None;
        self.odometry_pose = pose;

        // Old history and corrections are in the previous odometry frame
        self.history.clear();
        self.correction = None;

        debug!("Pose estimate reset to {}", pose);
    }

    /// The current best estimate of the pose.
    ///
    /// Before any odometry has been integrated this is the reset pose.
    pub fn estimated_pose(&self) -> Pose {
        match self.correction {
            Some(ref c) => c.transform.transform_by(&self.odometry_pose),
            None => self.odometry_pose,
        }
    }

    /// The odometry-only pose, without any vision correction.
    pub fn odometry_pose(&self) -> Pose {
        self.odometry_pose
    }

    pub fn correction(&self) -> Option<Correction> {
        self.correction
    }

    /// Time span covered by the odometry history, `None` if it is empty.
    pub fn history_span_s(&self) -> Option<(f64, f64)> {
        match (self.history.front(), self.history.back()) {
            (Some(f), Some(b)) => Some((f.timestamp_s, b.timestamp_s)),
            _ => None,
        }
    }

    fn record_history(&mut self, timestamp_s: f64) {
        // Keep the buffer strictly ordered even if time steps backwards
        while let Some(back) = self.history.back() {
            if back.timestamp_s >= timestamp_s {
                self.history.pop_back();
            }
            else {
                break;
            }
        }

        self.history.push_back(HistoryEntry {
            timestamp_s,
            pose: self.odometry_pose,
        });

        let oldest_s = timestamp_s - self.params.history_window_s;
        while self.history.len() > 1
            && self.history.front().map_or(false, |e| e.timestamp_s < oldest_s)
        {
            self.history.pop_front();
        }
    }

    fn try_apply_vision(&mut self, measurement: &VisionMeasurement) -> VisionOutcome {
        if !measurement.is_well_formed() {
            return VisionOutcome::Invalid;
        }

        if measurement.confidence < self.params.vision_confidence_threshold {
            return VisionOutcome::LowConfidence;
        }

        if let Some(ref c) = self.correction {
            if measurement.timestamp_s <= c.timestamp_s {
                return VisionOutcome::Superseded;
            }
        }

        let odometry_then = match self.odometry_at(measurement.timestamp_s) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };

        // Single assignment so readers never see half a correction
        self.correction = Some(Correction {
            timestamp_s: measurement.timestamp_s,
            transform: measurement.pose.transform_by(&odometry_then.inverse()),
        });

        VisionOutcome::Applied
    }

    /// The odometry pose at `timestamp_s`, interpolated between the two
    /// bracketing history entries. Times after the newest entry use the
    /// newest entry.
    fn odometry_at(&self, timestamp_s: f64) -> Result<Pose, VisionOutcome> {
        let oldest = self.history.front().ok_or(VisionOutcome::NoOdometry)?;

        if timestamp_s < oldest.timestamp_s {
            return Err(VisionOutcome::Stale);
        }

        let idx = self
            .history
            .iter()
            .position(|e| e.timestamp_s >= timestamp_s);

        let pose = match idx {
            None => self.odometry_pose,
            Some(0) => oldest.pose,
            Some(i) => {
                let before = &self.history[i - 1];
                let after = &self.history[i];
                let frac = (timestamp_s - before.timestamp_s)
                    / (after.timestamp_s - before.timestamp_s);

                before.pose.interpolate(&after.pose, frac)
            }
        };

        Ok(pose)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 0.02;

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(
            Params::default(),
            KinematicsModel::new(0.5).unwrap(),
            OdometrySample::default(),
            Pose::identity(),
        )
        .unwrap()
    }

    /// Drive straight at `speed` for `cycles`, starting from `start`.
    fn drive_straight(est: &mut PoseEstimator, start_s: f64, cycles: usize, speed: f64) -> f64 {
        let mut t = start_s;
        for _ in 0..cycles {
            t += DT;
            let d = speed * t;
            est.update(t, OdometrySample::new(0.0, d, d));
        }
        t
    }

    fn assert_pose_near(a: &Pose, b: &Pose, tol: f64) {
        assert!(a.distance_to(b) < tol, "{} != {}", a, b);
        assert!((wrap_angle(a.heading() - b.heading())).abs() < tol, "{} != {}", a, b);
    }

    #[test]
    fn test_invalid_params() {
        let kin = KinematicsModel::new(0.5).unwrap();
        let mut params = Params::default();
        params.vision_confidence_threshold = 1.5;
        assert!(PoseEstimator::new(params, kin, OdometrySample::default(), Pose::identity()).is_err());

        let mut params = Params::default();
        params.history_window_s = 0.0;
        assert!(PoseEstimator::new(params, kin, OdometrySample::default(), Pose::identity()).is_err());
    }

    #[test]
    fn test_pose_before_update_is_reset_pose() {
        let est = estimator();
        assert_eq!(est.estimated_pose(), Pose::identity());
        assert!(est.history_span_s().is_none());
    }

    #[test]
    fn test_odometry_straight_line() {
        for &d in &[0.01, 1.0, 3.7, 25.0] {
            let mut est = estimator();
            let pose = est.update(0.02, OdometrySample::new(0.0, d, d));

            assert!((pose.x() - d).abs() < 1e-9);
            assert!(pose.y().abs() < 1e-12);
            assert_eq!(pose.heading(), 0.0);
        }
    }

    #[test]
    fn test_odometry_arc() {
        // Quarter circle of radius 1 m with a 0.5 m track
        let mut est = estimator();
        let steps = 100;
        for i in 1..=steps {
            let frac = i as f64 / steps as f64;
            let heading = FRAC_PI_2 * frac;
            let left = 0.75 * FRAC_PI_2 * frac;
            let right = 1.25 * FRAC_PI_2 * frac;
            est.update(i as f64 * DT, OdometrySample::new(heading, left, right));
        }

        assert_pose_near(&est.estimated_pose(), &Pose::new(1.0, 1.0, FRAC_PI_2), 1e-6);
    }

    #[test]
    fn test_reset_is_atomic() {
        let mut est = estimator();
        drive_straight(&mut est, 0.0, 20, 1.0);

        // Reset while the raw sensors still read their old values
        let raw = OdometrySample::new(0.3, 0.4, 0.4);
        est.reset_pose(Pose::new(5.0, 2.0, 0.0), raw);
        let pose = est.update(1.0, raw);

        assert_eq!(pose, Pose::new(5.0, 2.0, 0.0));
        assert!(est.correction().is_none());
    }

    #[test]
    fn test_low_confidence_rejected() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 10, 1.0);
        let before = est.estimated_pose();

        let outcome = est.add_vision_measurement(&VisionMeasurement::new(
            Pose::new(3.0, 3.0, 1.0),
            t,
            0.5,
        ));

        assert_eq!(outcome, VisionOutcome::LowConfidence);
        assert_eq!(est.estimated_pose(), before);
    }

    #[test]
    fn test_invalid_measurement_rejected() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 10, 1.0);

        let nan_pose = VisionMeasurement::new(Pose::new(std::f64::NAN, 0.0, 0.0), t, 0.9);
        let bad_conf = VisionMeasurement::new(Pose::identity(), t, 1.2);

        assert_eq!(est.add_vision_measurement(&nan_pose), VisionOutcome::Invalid);
        assert_eq!(est.add_vision_measurement(&bad_conf), VisionOutcome::Invalid);
    }

    #[test]
    fn test_no_odometry_rejected() {
        let mut est = estimator();
        let m = VisionMeasurement::new(Pose::new(1.0, 1.0, 0.0), 0.0, 0.9);

        assert_eq!(est.add_vision_measurement(&m), VisionOutcome::NoOdometry);
        assert_eq!(est.estimated_pose(), Pose::identity());
    }

    #[test]
    fn test_stale_rejected() {
        let mut est = estimator();
        // 3 s of driving with a 1.5 s window
        let t = drive_straight(&mut est, 0.0, 150, 1.0);
        let before = est.estimated_pose();
        let (oldest_s, newest_s) = est.history_span_s().unwrap();

        assert!(oldest_s >= t - 1.5 - 1e-9);
        assert_eq!(newest_s, t);

        let outcome = est.add_vision_measurement(&VisionMeasurement::new(
            Pose::new(0.5, 0.5, 0.0),
            oldest_s - 0.01,
            1.0,
        ));

        assert_eq!(outcome, VisionOutcome::Stale);
        assert_eq!(est.estimated_pose(), before);
    }

    #[test]
    fn test_latency_compensation() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 50, 1.0);

        // Odometry has drifted 0.1 m short in x and 0.2 m in y. The vision
        // frame was captured 0.2 s ago, when the robot was truly at x = 0.9.
        let captured_s = t - 0.2;
        let outcome = est.add_vision_measurement(&VisionMeasurement::new(
            Pose::new(captured_s * 1.0 + 0.1, 0.2, 0.0),
            captured_s,
            0.9,
        ));
        assert_eq!(outcome, VisionOutcome::Applied);

        // The correction carries the 0.2 s of motion since capture
        assert_pose_near(&est.estimated_pose(), &Pose::new(t + 0.1, 0.2, 0.0), 1e-9);

        // And is applied to subsequent updates
        let t = drive_straight(&mut est, t, 10, 1.0);
        assert_pose_near(&est.estimated_pose(), &Pose::new(t + 0.1, 0.2, 0.0), 1e-9);
    }

    #[test]
    fn test_interpolates_between_samples() {
        let mut est = estimator();
        est.update(0.0, OdometrySample::new(0.0, 0.0, 0.0));
        est.update(0.1, OdometrySample::new(0.0, 1.0, 1.0));

        // Half way between the two samples odometry was at x = 0.5
        est.add_vision_measurement(&VisionMeasurement::new(Pose::new(0.5, 1.0, 0.0), 0.05, 1.0));

        assert_pose_near(&est.estimated_pose(), &Pose::new(1.0, 1.0, 0.0), 1e-9);
    }

    #[test]
    fn test_vision_idempotent() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 25, 1.0);
        let m = VisionMeasurement::new(Pose::new(1.0, -0.3, 0.1), t - 0.1, 0.95);

        assert_eq!(est.add_vision_measurement(&m), VisionOutcome::Applied);
        let once = est.estimated_pose();

        assert_eq!(est.add_vision_measurement(&m), VisionOutcome::Superseded);
        assert_eq!(est.estimated_pose(), once);
    }

    #[test]
    fn test_out_of_order_ignored() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 25, 1.0);

        let newer = VisionMeasurement::new(Pose::new(0.5, 0.1, 0.0), t - 0.05, 0.9);
        let older = VisionMeasurement::new(Pose::new(9.0, 9.0, 1.0), t - 0.2, 0.9);

        assert_eq!(est.add_vision_measurement(&newer), VisionOutcome::Applied);
        let expected = est.estimated_pose();

        assert_eq!(est.add_vision_measurement(&older), VisionOutcome::Superseded);
        assert_eq!(est.estimated_pose(), expected);
    }

    #[test]
    fn test_reset_clears_correction() {
        let mut est = estimator();
        let t = drive_straight(&mut est, 0.0, 25, 1.0);
        est.add_vision_measurement(&VisionMeasurement::new(Pose::new(4.0, 4.0, 0.0), t, 1.0));
        assert!(est.correction().is_some());

        est.reset_pose(Pose::identity(), OdometrySample::default());
        assert!(est.correction().is_none());
        assert!(est.history_span_s().is_none());
        assert_eq!(est.estimated_pose(), Pose::identity());
    }
}
