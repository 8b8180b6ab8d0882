//! Drive base state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};

// Internal
use super::*;
use crate::{
    drive_io::{DriveIo, NeutralMode, SensorData},
    kinematics::{KinematicsModel, Pose, WheelSpeeds},
    pose_est::{self, OdometrySample, PoseEstimator, VisionOutcome},
    traj_ctrl::{self, InitData, TrajCtrl, TrajCtrlCmd, Trajectory},
    vision_client::VisionSource,
};
use util::{
    maths::{clamp, signed_square},
    module::State,
    time::Clock,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of vision measurements consumed in one cycle.
const MAX_VISION_PER_CYCLE: usize = 32;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of every module owned by the drive base.
#[derive(Debug, Clone)]
pub struct DriveParams {
    pub drive_base: Params,
    pub pose_est: pose_est::Params,
    pub traj_ctrl: traj_ctrl::Params,
}

pub struct DriveBase {
    params: Params,

    io: Box<dyn DriveIo>,
    clock: Box<dyn Clock>,
    vision: Box<dyn VisionSource>,

    estimator: PoseEstimator,
    traj_ctrl: TrajCtrl,

    /// Current actuation demand
    demand: Demand,

    /// True while trajectory control owns the demand
    following: bool,

    left_limiter: SlewRateLimiter,
    right_limiter: SlewRateLimiter,

    neutral_mode: NeutralMode,

    /// Time of the previous cycle
    last_cycle_s: Option<f64>,

    /// Values from the most recent cycle
    sensors: SensorData,
    voltages: WheelSpeeds,
    traj_report: traj_ctrl::StatusReport,

    vision_applied: u64,
    vision_dropped: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq)]
enum Demand {
    /// Voltages, clamped to the supply
    Voltage(WheelSpeeds),

    /// Percent outputs in [-1, 1], slew rate limited
    Percent(WheelSpeeds),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveBase {
    /// Build the drive base.
    ///
    /// The encoders are zeroed and the pose estimate starts at the origin.
    pub fn new(
        params: DriveParams,
        mut io: Box<dyn DriveIo>,
        clock: Box<dyn Clock>,
        vision: Box<dyn VisionSource>,
    ) -> Result<Self, DriveBaseError> {
        params.drive_base.validate()?;

        let kinematics = KinematicsModel::new(params.drive_base.track_width_m)?;

        io.set_neutral_mode(params.drive_base.neutral_mode);
        io.reset_encoders();
        let sensors = io.read();

        let estimator = PoseEstimator::new(
            params.pose_est,
            kinematics,
            odometry_sample(&sensors),
            Pose::identity(),
        )?;

        let traj_ctrl = TrajCtrl::init(InitData {
            params: params.traj_ctrl,
            kinematics,
        })?;

        let rate = params.drive_base.acceleration_rate_limit;

        Ok(Self {
            neutral_mode: params.drive_base.neutral_mode,
            params: params.drive_base,
            io,
            clock,
            vision,
            estimator,
            traj_ctrl,
            demand: Demand::Voltage(WheelSpeeds::default()),
            following: false,
            left_limiter: SlewRateLimiter::new(rate),
            right_limiter: SlewRateLimiter::new(rate),
            last_cycle_s: None,
            sensors,
            voltages: WheelSpeeds::default(),
            traj_report: traj_ctrl::StatusReport::default(),
            vision_applied: 0,
            vision_dropped: 0,
        })
    }

    /// Run one control cycle.
    pub fn periodic(&mut self) -> Result<(), DriveBaseError> {
        let now_s = self.clock.now_s();
        let dt = match self.last_cycle_s {
            Some(t) if now_s > t => now_s - t,
            _ => 0.0,
        };
        self.last_cycle_s = Some(now_s);

        // The interval just elapsed was driven at last cycle's voltages
        self.io.step(dt)?;

        // ---- ESTIMATION ----

        self.sensors = self.io.read();
        self.estimator.update(now_s, odometry_sample(&self.sensors));

        for _ in 0..MAX_VISION_PER_CYCLE {
            let measurement = match self.vision.poll() {
                Some(m) => m,
                None => break,
            };

            match self.estimator.add_vision_measurement(&measurement) {
                VisionOutcome::Applied => self.vision_applied += 1,
                _ => self.vision_dropped += 1,
            }
        }

        // ---- TRAJECTORY CONTROL ----

        let (cmd, report) = self.traj_ctrl.proc(&traj_ctrl::InputData {
            time_s: now_s,
            pose: self.estimator.estimated_pose(),
            wheel_speeds: self.sensors.wheel_speeds,
        })?;
        self.traj_report = report;

        if self.following {
            match cmd {
                Some(TrajCtrlCmd::Voltages(v)) => self.demand = Demand::Voltage(v),
                Some(TrajCtrlCmd::Stop) => self.stop_drive(),
                None => (),
            }
        }

        // ---- ACTUATION ----

        self.voltages = self.actuation_voltages(dt);
        self.io.set_voltages(self.voltages);

        Ok(())
    }

    // ---- COMMANDS ----

    /// Command the voltage of each side directly.
    pub fn tank_drive_voltage(&mut self, left_v: f64, right_v: f64) {
        self.take_manual_control();
        self.demand = Demand::Voltage(WheelSpeeds::new(left_v, right_v));
    }

    /// Percent output tank drive.
    ///
    /// Inputs are clamped to [-1, 1], and if `squared_inputs` is set squared
    /// while keeping their sign for finer control at low speed.
    pub fn tank_drive(&mut self, left: f64, right: f64, squared_inputs: bool) {
        self.take_manual_control();

        let shape = |v: f64| {
            let v = clamp(v, -1.0, 1.0);
            if squared_inputs { signed_square(v) } else { v }
        };

        self.set_percent_demand(WheelSpeeds::new(shape(left), shape(right)));
    }

    /// Percent output arcade drive, `rotation` is anticlockwise positive.
    pub fn arcade_drive(&mut self, speed: f64, rotation: f64, squared_inputs: bool) {
        self.take_manual_control();
        self.set_percent_demand(arcade_drive_ik(speed, rotation, squared_inputs));
    }

    /// Stop the drive, resetting the slew rate limiters.
    pub fn stop_drive(&mut self) {
        self.demand = Demand::Voltage(WheelSpeeds::default());
        self.following = false;
        self.left_limiter.reset(0.0);
        self.right_limiter.reset(0.0);
    }

    /// Hand a trajectory to trajectory control. It begins on the next cycle
    /// and the drive is stopped once it ends.
    pub fn follow_trajectory(&mut self, trajectory: Trajectory) -> Result<(), DriveBaseError> {
        self.traj_ctrl.begin_trajectory(trajectory)?;
        self.following = true;

        Ok(())
    }

    /// Abort the current trajectory and stop the drive.
    pub fn abort_trajectory(&mut self) {
        self.traj_ctrl.abort_trajectory();

        if self.following {
            self.stop_drive();
        }
    }

    pub fn is_following_trajectory(&self) -> bool {
        self.following
    }

    pub fn set_neutral_mode(&mut self, mode: NeutralMode) {
        info!("Drive neutral mode set to {:?}", mode);
        self.neutral_mode = mode;
        self.io.set_neutral_mode(mode);
    }

    /// Switch between brake and coast.
    pub fn toggle_neutral_mode(&mut self) {
        self.set_neutral_mode(self.neutral_mode.toggled());
    }

    pub fn neutral_mode(&self) -> NeutralMode {
        self.neutral_mode
    }

    // ---- RESETS ----

    /// Reset the pose estimate to `pose`, zeroing the encoders.
    ///
    /// The encoders are zeroed and the new baseline read before the
    /// estimator is reset, so no cycle can see one without the other.
    pub fn reset_odometry(&mut self, pose: Pose) {
        self.io.reset_encoders();
        self.sensors = self.io.read();
        self.estimator.reset_pose(pose, odometry_sample(&self.sensors));
    }

    /// Zero the encoders, keeping the current pose estimate.
    pub fn reset_encoders(&mut self) {
        let pose = self.get_pose();
        self.reset_odometry(pose);
    }

    /// Zero the gyro, keeping the current pose estimate.
    pub fn zero_gyro(&mut self) {
        let pose = self.get_pose();

        self.io.zero_gyro();
        self.sensors = self.io.read();
        self.estimator.reset_pose(pose, odometry_sample(&self.sensors));
    }

    // ---- QUERIES ----

    /// The fused pose estimate.
    pub fn get_pose(&self) -> Pose {
        self.estimator.estimated_pose()
    }

    /// Measured wheel speeds, meters/second.
    pub fn get_wheel_speeds(&self) -> WheelSpeeds {
        self.sensors.wheel_speeds
    }

    /// Current drawn by the drive, only available in simulation.
    pub fn get_drawn_current_amps(&self) -> Option<f64> {
        self.io.current_draw_amps()
    }

    /// Gyro heading, radians anticlockwise positive.
    pub fn get_heading(&self) -> f64 {
        self.sensors.heading_rad
    }

    /// Turn rate, degrees/second anticlockwise positive.
    pub fn get_turn_rate(&self) -> f64 {
        self.sensors.turn_rate_rads.to_degrees()
    }

    pub fn get_left_distance_m(&self) -> f64 {
        self.sensors.left_distance_m
    }

    pub fn get_right_distance_m(&self) -> f64 {
        self.sensors.right_distance_m
    }

    pub fn get_average_distance_m(&self) -> f64 {
        (self.sensors.left_distance_m + self.sensors.right_distance_m) / 2.0
    }

    /// The current pose expressed in the frame of `target`.
    pub fn get_distance_to_pose(&self, target: &Pose) -> Pose {
        self.get_pose().relative_to(target)
    }

    /// Ground truth pose, only available in simulation.
    pub fn true_pose(&self) -> Option<Pose> {
        self.io.true_pose()
    }

    /// Voltages applied in the last cycle.
    pub fn get_voltages(&self) -> WheelSpeeds {
        self.voltages
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    pub fn traj_report(&self) -> &traj_ctrl::StatusReport {
        &self.traj_report
    }

    /// Telemetry record for the last cycle.
    pub fn telemetry(&self) -> DriveTm {
        let pose = self.get_pose();
        let odom = self.estimator.odometry_pose();
        let truth = self.true_pose();

        DriveTm {
            time_s: self.last_cycle_s.unwrap_or(0.0),
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading(),
            odom_x_m: odom.x(),
            odom_y_m: odom.y(),
            odom_heading_rad: odom.heading(),
            true_x_m: truth.map(|p| p.x()),
            true_y_m: truth.map(|p| p.y()),
            true_heading_rad: truth.map(|p| p.heading()),
            left_distance_m: self.sensors.left_distance_m,
            right_distance_m: self.sensors.right_distance_m,
            left_speed_ms: self.sensors.wheel_speeds.left,
            right_speed_ms: self.sensors.wheel_speeds.right,
            left_voltage_v: self.voltages.left,
            right_voltage_v: self.voltages.right,
            current_draw_a: self.get_drawn_current_amps(),
            traj_mode: self.traj_ctrl.mode(),
            along_track_error_m: self.traj_report.along_track_error_m,
            cross_track_error_m: self.traj_report.cross_track_error_m,
            traj_heading_error_rad: self.traj_report.heading_error_rad,
            vision_applied: self.vision_applied,
            vision_dropped: self.vision_dropped,
        }
    }

    /// Manual commands take over from trajectory control.
    fn take_manual_control(&mut self) {
        if self.following {
            debug!("Manual drive command received, aborting trajectory");
            self.traj_ctrl.abort_trajectory();
            self.following = false;
        }
    }

    /// Percent demands ramp from the output currently applied.
    fn set_percent_demand(&mut self, percent: WheelSpeeds) {
        if let Demand::Voltage(_) = self.demand {
            let supply_v = self.params.supply_voltage_v;
            self.left_limiter.reset(clamp(self.voltages.left / supply_v, -1.0, 1.0));
            self.right_limiter.reset(clamp(self.voltages.right / supply_v, -1.0, 1.0));
        }

        self.demand = Demand::Percent(percent);
    }

    fn actuation_voltages(&mut self, dt: f64) -> WheelSpeeds {
        let supply_v = self.params.supply_voltage_v;

        match self.demand {
            Demand::Voltage(v) => v.clamp(supply_v),
            Demand::Percent(p) => WheelSpeeds::new(
                self.left_limiter.calculate(p.left, dt) * supply_v,
                self.right_limiter.calculate(p.right, dt) * supply_v,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn odometry_sample(sensors: &SensorData) -> OdometrySample {
    OdometrySample::new(
        sensors.heading_rad,
        sensors.left_distance_m,
        sensors.right_distance_m,
    )
}

/// Arcade drive inverse kinematics on percent outputs.
///
/// The wheel outputs are normalised so that neither exceeds 1 while a full
/// speed demand with no rotation still gives full output on both sides.
pub fn arcade_drive_ik(speed: f64, rotation: f64, squared_inputs: bool) -> WheelSpeeds {
    let mut speed = clamp(speed, -1.0, 1.0);
    let mut rotation = clamp(rotation, -1.0, 1.0);

    if squared_inputs {
        speed = signed_square(speed);
        rotation = signed_square(rotation);
    }

    let greater = speed.abs().max(rotation.abs());
    let lesser = speed.abs().min(rotation.abs());

    if greater == 0.0 {
        return WheelSpeeds::default();
    }

    let saturated = (greater + lesser) / greater;

    WheelSpeeds::new(
        (speed - rotation) / saturated,
        (speed + rotation) / saturated,
    )
}
