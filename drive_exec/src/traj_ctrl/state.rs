//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::kinematics::{KinematicsModel, Pose, WheelSpeeds};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct TrajCtrl {
    params: Params,

    /// Executing mode
    mode: TrajCtrlMode,

    kinematics: KinematicsModel,

    input: InputData,
    output: Option<TrajCtrlCmd>,
    report: StatusReport,

    /// The trajectory being followed
    trajectory: Option<Trajectory>,

    /// Time of the first cycle spent following the trajectory
    start_time_s: Option<f64>,

    /// Time and wheel speed targets of the previous cycle
    prev_targets: Option<(f64, WheelSpeeds)>,

    ramsete: RamseteController,
    feedforward: SimpleMotorFeedforward,
    left_pid: PidController,
    right_pid: PidController,
}

/// Data needed to initialise the module.
#[derive(Debug, Clone)]
pub struct InitData {
    pub params: Params,
    pub kinematics: KinematicsModel,
}

/// Input data to the module
#[derive(Debug, Default, Copy, Clone)]
pub struct InputData {
    /// Current time on the control cycle's clock
    pub time_s: f64,

    /// Current estimated pose
    pub pose: Pose,

    /// Measured wheel speeds, meters/second
    pub wheel_speeds: WheelSpeeds,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Time since the trajectory began
    pub elapsed_s: f64,

    /// Error along the robot's forward axis to the reference
    pub along_track_error_m: f64,

    /// Error across the robot's forward axis, positive if the reference is
    /// to the left
    pub cross_track_error_m: f64,

    /// Heading of the reference relative to the robot
    pub heading_error_rad: f64,

    /// Wheel speed targets, meters/second
    pub target_wheel_speeds: WheelSpeeds,

    /// If true the limit on the position error has been exceeded
    pub position_error_limit_exceeded: bool,

    /// If true the limit on the heading error has been exceeded
    pub heading_error_limit_exceeded: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur in the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Ramsete gains must satisfy b > 0 and 0 < zeta < 1, found b = {0}, zeta = {1}")]
    InvalidRamseteGains(f64, f64),

    #[error("Maximum wheel speed must be positive, found {0} m/s")]
    InvalidMaxWheelSpeed(f64),

    /// A trajectory is already loaded. This error occurs when attempting to
    /// start a new trajectory before the current one has finished.
    #[error("Attempted to load a trajectory while one is already loaded")]
    TrajectoryAlreadyLoaded,

    /// The module is following a trajectory but none is loaded.
    #[error("No trajectory has been set")]
    NoTrajectory,
}

/// The possible modes of execution of TrajCtrl. Each mode is handled by a
/// `mode_xyz` function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrajCtrlMode {
    Off,
    Following,
    Finished,
}

/// Command produced by the module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum TrajCtrlCmd {
    /// Apply these voltages to the wheels
    Voltages(WheelSpeeds),

    /// Stop the drive
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrajCtrl {
    type InitData = InitData;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = Option<TrajCtrlCmd>;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let params = init_data.params;

        let ramsete = RamseteController::new(params.ramsete_b, params.ramsete_zeta)?;

        if !(params.max_wheel_speed_ms.is_finite() && params.max_wheel_speed_ms > 0.0) {
            return Err(TrajCtrlError::InvalidMaxWheelSpeed(params.max_wheel_speed_ms));
        }

        Ok(Self {
            feedforward: SimpleMotorFeedforward::new(params.ff_k_s, params.ff_k_v, params.ff_k_a),
            left_pid: PidController::new(params.wheel_k_p, params.wheel_k_i, params.wheel_k_d),
            right_pid: PidController::new(params.wheel_k_p, params.wheel_k_i, params.wheel_k_d),
            ramsete,
            params,
            mode: TrajCtrlMode::Off,
            kinematics: init_data.kinematics,
            input: InputData::default(),
            output: None,
            report: StatusReport::default(),
            trajectory: None,
            start_time_s: None,
            prev_targets: None,
        })
    }

    /// Process trajectory control.
    ///
    /// Returns `None` when there is nothing to command, `Stop` once when a
    /// trajectory ends or is aborted, otherwise the wheel voltages.
    fn proc(
        &mut self,
        input_data: &Self::InputData
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {

        // Setup cycle data
        self.input = *input_data;
        self.output = None;
        self.report = StatusReport::default();

        match self.mode {
            TrajCtrlMode::Off => self.mode_off(),
            TrajCtrlMode::Following => self.mode_following(),
            TrajCtrlMode::Finished => self.mode_finished(),
        }?;

        Ok((self.output, self.report))
    }
}

impl TrajCtrl {

    /// Begin following a trajectory.
    ///
    /// The trajectory's clock starts on the next call to `proc`. Loading a
    /// new trajectory before the current one has finished is an error, call
    /// `abort_trajectory` first.
    pub fn begin_trajectory(&mut self, trajectory: Trajectory) -> Result<(), TrajCtrlError> {
        if self.trajectory.is_some() {
            return Err(TrajCtrlError::TrajectoryAlreadyLoaded)
        }

        info!(
            "Beginning trajectory of {} states lasting {:.2} s",
            trajectory.states().len(),
            trajectory.total_time_s()
        );

        self.trajectory = Some(trajectory);
        self.start_time_s = None;
        self.prev_targets = None;
        self.left_pid.reset();
        self.right_pid.reset();

        self.mode = TrajCtrlMode::Following;

        Ok(())
    }

    /// Abort the current trajectory.
    ///
    /// The trajectory is cleared immediately, so a new one may be begun
    /// straight away. If none is begun the next call to `proc` issues a stop
    /// command. Does nothing if no trajectory is loaded.
    pub fn abort_trajectory(&mut self) {
        if self.trajectory.is_some() {
            info!("Trajectory aborted");
            self.clear_trajectory();
            self.mode = TrajCtrlMode::Finished;
        }
    }

    pub fn mode(&self) -> TrajCtrlMode {
        self.mode
    }

    /// True while a trajectory is loaded.
    pub fn is_active(&self) -> bool {
        self.trajectory.is_some()
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// Mode off, nothing is commanded.
    fn mode_off(&mut self) -> Result<(), TrajCtrlError> {
        Ok(())
    }

    /// Mode following
    ///
    /// Sample the reference, check the tracking error against its limits and
    /// compute the wheel voltages.
    fn mode_following(&mut self) -> Result<(), TrajCtrlError> {
        let trajectory = self.trajectory.as_ref().ok_or(TrajCtrlError::NoTrajectory)?;
        let time_s = self.input.time_s;

        let start_time_s = *self.start_time_s.get_or_insert(time_s);
        let elapsed_s = time_s - start_time_s;
        let reference = trajectory.sample(elapsed_s);
        let finished = elapsed_s >= trajectory.total_time_s();

        // ---- ERROR MONITORING ----

        let error = reference.pose.relative_to(&self.input.pose);

        self.report.elapsed_s = elapsed_s;
        self.report.along_track_error_m = error.x();
        self.report.cross_track_error_m = error.y();
        self.report.heading_error_rad = error.heading();

        if error.position_m.norm() > self.params.position_error_limit_m {
            self.report.position_error_limit_exceeded = true;
        }
        if error.heading().abs() > self.params.heading_error_limit_rad {
            self.report.heading_error_limit_exceeded = true;
        }

        if self.report.position_error_limit_exceeded || self.report.heading_error_limit_exceeded {
            warn!(
                "Tracking error limit exceeded ({:.3} m, {:.3} rad), aborting trajectory",
                error.position_m.norm(),
                error.heading()
            );

            // Stop immediately so we remain as close to the trajectory as
            // possible
            self.mode = TrajCtrlMode::Finished;
            return self.mode_finished();
        }

        // ---- COMMAND GENERATION ----

        let chassis = self.ramsete.calculate(&self.input.pose, &reference);
        let targets = self
            .kinematics
            .to_wheel_speeds(&chassis)
            .desaturate(self.params.max_wheel_speed_ms);
        self.report.target_wheel_speeds = targets;

        // Wheel acceleration from the change in target over the actual cycle
        // time
        let dt = self.prev_targets.map(|(t, _)| time_s - t);
        let accel = match self.prev_targets {
            Some((t, prev)) if time_s > t => WheelSpeeds::new(
                (targets.left - prev.left) / (time_s - t),
                (targets.right - prev.right) / (time_s - t),
            ),
            _ => WheelSpeeds::default(),
        };

        let measured = self.input.wheel_speeds;
        let left_v = self.feedforward.calculate(targets.left, accel.left)
            + self.left_pid.get(targets.left - measured.left, dt);
        let right_v = self.feedforward.calculate(targets.right, accel.right)
            + self.right_pid.get(targets.right - measured.right, dt);

        self.output = Some(TrajCtrlCmd::Voltages(WheelSpeeds::new(left_v, right_v)));
        self.prev_targets = Some((time_s, targets));

        if finished {
            info!("Trajectory complete after {:.2} s", elapsed_s);
            self.mode = TrajCtrlMode::Finished;
        }

        Ok(())
    }

    /// Mode finished.
    ///
    /// Issue a stop command, clear the trajectory and switch off.
    fn mode_finished(&mut self) -> Result<(), TrajCtrlError> {
        self.output = Some(TrajCtrlCmd::Stop);
        self.clear_trajectory();
        self.mode = TrajCtrlMode::Off;

        Ok(())
    }

    fn clear_trajectory(&mut self) {
        self.trajectory = None;
        self.start_time_s = None;
        self.prev_targets = None;
        self.left_pid.reset();
        self.right_pid.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> Params {
        Params {
            ramsete_b: 2.0,
            ramsete_zeta: 0.7,
            ff_k_s: 0.86841,
            ff_k_v: 4.009,
            ff_k_a: 2.6045,
            wheel_k_p: 0.25889,
            wheel_k_i: 0.0,
            wheel_k_d: 0.13772,
            max_wheel_speed_ms: 3.0,
            position_error_limit_m: 1.0,
            heading_error_limit_rad: 1.0,
        }
    }

    fn traj_ctrl() -> TrajCtrl {
        TrajCtrl::init(InitData {
            params: params(),
            kinematics: KinematicsModel::new(0.5).unwrap(),
        })
        .unwrap()
    }

    /// Drive forward at a constant 1 m/s for 1 s.
    fn straight() -> Trajectory {
        let state = |t: f64| TrajectoryState {
            time_s: t,
            pose: Pose::new(t, 0.0, 0.0),
            velocity_ms: 1.0,
            acceleration_mss: 0.0,
            curvature_radpm: 0.0,
        };

        Trajectory::new(vec![state(0.0), state(0.5), state(1.0)]).unwrap()
    }

    fn input(time_s: f64, pose: Pose, speed_ms: f64) -> InputData {
        InputData {
            time_s,
            pose,
            wheel_speeds: WheelSpeeds::new(speed_ms, speed_ms),
        }
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params();
        p.ramsete_zeta = 1.5;

        let res = TrajCtrl::init(InitData {
            params: p,
            kinematics: KinematicsModel::new(0.5).unwrap(),
        });

        assert!(matches!(res, Err(TrajCtrlError::InvalidRamseteGains(_, _))));
    }

    #[test]
    fn test_off_commands_nothing() {
        let mut tc = traj_ctrl();

        let (out, _) = tc.proc(&input(0.0, Pose::identity(), 0.0)).unwrap();

        assert_eq!(out, None);
        assert_eq!(tc.mode(), TrajCtrlMode::Off);
    }

    #[test]
    fn test_begin_twice() {
        let mut tc = traj_ctrl();

        tc.begin_trajectory(straight()).unwrap();
        assert!(matches!(
            tc.begin_trajectory(straight()),
            Err(TrajCtrlError::TrajectoryAlreadyLoaded)
        ));
    }

    #[test]
    fn test_follow_on_track() {
        let mut tc = traj_ctrl();
        tc.begin_trajectory(straight()).unwrap();

        // Exactly on the reference and at the reference speed, so the output
        // is the feed-forward alone
        let (out, report) = tc.proc(&input(10.0, Pose::identity(), 1.0)).unwrap();
        let expected = 0.86841 + 4.009;

        match out {
            Some(TrajCtrlCmd::Voltages(v)) => {
                assert!((v.left - expected).abs() < 1e-9);
                assert!((v.right - expected).abs() < 1e-9);
            }
            _ => panic!("Expected voltages, got {:?}", out),
        }
        assert_eq!(report.elapsed_s, 0.0);

        let (_, report) = tc.proc(&input(10.5, Pose::new(0.5, 0.0, 0.0), 1.0)).unwrap();
        assert!((report.elapsed_s - 0.5).abs() < 1e-12);
        assert!(report.along_track_error_m.abs() < 1e-9);
        assert_eq!(tc.mode(), TrajCtrlMode::Following);

        // Final state reached
        tc.proc(&input(11.0, Pose::new(1.0, 0.0, 0.0), 1.0)).unwrap();
        assert_eq!(tc.mode(), TrajCtrlMode::Finished);

        let (out, _) = tc.proc(&input(11.02, Pose::new(1.0, 0.0, 0.0), 1.0)).unwrap();
        assert_eq!(out, Some(TrajCtrlCmd::Stop));
        assert_eq!(tc.mode(), TrajCtrlMode::Off);
        assert!(!tc.is_active());
    }

    #[test]
    fn test_abort() {
        let mut tc = traj_ctrl();

        // Aborting with nothing loaded has no effect
        tc.abort_trajectory();
        assert_eq!(tc.mode(), TrajCtrlMode::Off);

        tc.begin_trajectory(straight()).unwrap();
        tc.proc(&input(0.0, Pose::identity(), 0.0)).unwrap();
        tc.abort_trajectory();
        assert!(!tc.is_active());

        let (out, _) = tc.proc(&input(0.02, Pose::identity(), 0.0)).unwrap();
        assert_eq!(out, Some(TrajCtrlCmd::Stop));
        assert_eq!(tc.mode(), TrajCtrlMode::Off);

        // A new trajectory can now be loaded
        assert!(tc.begin_trajectory(straight()).is_ok());
    }

    #[test]
    fn test_begin_right_after_abort() {
        let mut tc = traj_ctrl();
        tc.begin_trajectory(straight()).unwrap();
        tc.proc(&input(0.0, Pose::identity(), 0.0)).unwrap();

        // Replace the trajectory within the same cycle
        tc.abort_trajectory();
        tc.begin_trajectory(straight()).unwrap();
        assert_eq!(tc.mode(), TrajCtrlMode::Following);

        // The new trajectory starts its own clock rather than stopping
        let (out, report) = tc.proc(&input(5.0, Pose::identity(), 1.0)).unwrap();
        assert!(matches!(out, Some(TrajCtrlCmd::Voltages(_))));
        assert_eq!(report.elapsed_s, 0.0);
    }

    #[test]
    fn test_error_limit_aborts() {
        let mut tc = traj_ctrl();
        tc.begin_trajectory(straight()).unwrap();

        let (out, report) = tc.proc(&input(0.0, Pose::new(0.0, 2.0, 0.0), 0.0)).unwrap();

        assert!(report.position_error_limit_exceeded);
        assert!(!report.heading_error_limit_exceeded);
        assert_eq!(out, Some(TrajCtrlCmd::Stop));
        assert_eq!(tc.mode(), TrajCtrlMode::Off);
    }
}
