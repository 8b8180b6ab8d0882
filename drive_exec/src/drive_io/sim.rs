//! [`DriveIo`] implementation backed by the drivetrain simulator

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use super::{DriveIo, DriveIoError, NeutralMode, SensorData};
use crate::{
    drive_sim::DrivetrainSimulator,
    kinematics::{Pose, WheelSpeeds},
};
use util::maths::wrap_angle;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated sensors and actuators.
///
/// The simulator's wheel positions and heading are never reset, zeroing is
/// done by recording offsets.
pub struct SimulatedSensors {
    sim: DrivetrainSimulator,

    left_offset_m: f64,
    right_offset_m: f64,
    heading_offset_rad: f64,

    neutral_mode: NeutralMode,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimulatedSensors {
    pub fn new(sim: DrivetrainSimulator) -> Self {
        Self {
            sim,
            left_offset_m: 0.0,
            right_offset_m: 0.0,
            heading_offset_rad: 0.0,
            neutral_mode: NeutralMode::default(),
        }
    }

    pub fn neutral_mode(&self) -> NeutralMode {
        self.neutral_mode
    }
}

impl DriveIo for SimulatedSensors {
    fn read(&mut self) -> SensorData {
        let state = self.sim.state();

        SensorData {
            heading_rad: wrap_angle(state.heading_rad - self.heading_offset_rad),
            turn_rate_rads: self.sim.chassis_velocity().angular_rads,
            left_distance_m: state.left_position_m - self.left_offset_m,
            right_distance_m: state.right_position_m - self.right_offset_m,
            wheel_speeds: self.sim.wheel_speeds(),
        }
    }

    fn set_voltages(&mut self, voltages: WheelSpeeds) {
        self.sim.set_inputs(voltages.left, voltages.right);
    }

    fn reset_encoders(&mut self) {
        self.left_offset_m = self.sim.state().left_position_m;
        self.right_offset_m = self.sim.state().right_position_m;
    }

    fn zero_gyro(&mut self) {
        self.heading_offset_rad = self.sim.state().heading_rad;
    }

    fn set_neutral_mode(&mut self, mode: NeutralMode) {
        debug!("Simulated drive neutral mode set to {:?}", mode);
        self.neutral_mode = mode;
    }

    fn step(&mut self, dt: f64) -> Result<(), DriveIoError> {
        self.sim.update(dt)?;
        Ok(())
    }

    fn current_draw_amps(&self) -> Option<f64> {
        Some(self.sim.get_current_draw_amps())
    }

    fn true_pose(&self) -> Option<Pose> {
        Some(self.sim.true_pose())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_sim::{MotorKind, Params, PlantParams};

    fn sim() -> DrivetrainSimulator {
        DrivetrainSimulator::new(&Params {
            plant: PlantParams::Characterised {
                kv_linear: 4.009,
                ka_linear: 2.6045,
                kv_angular: 20.0,
                ka_angular: 10.0,
            },
            motor: MotorKind::Falcon500,
            motors_per_side: 2,
            gearing: 10.71,
            wheel_radius_m: 0.0762,
            track_width_m: 0.47625,
            supply_voltage_v: 12.0,
        })
        .unwrap()
    }

    #[test]
    fn test_zeroing() {
        let mut io = SimulatedSensors::new(sim());

        io.set_voltages(WheelSpeeds::new(4.0, 6.0));
        for _ in 0..50 {
            io.step(0.02).unwrap();
        }

        let before = io.read();
        assert!(before.left_distance_m > 0.0);
        assert!(before.heading_rad > 0.0);

        io.reset_encoders();
        io.zero_gyro();

        let after = io.read();
        assert_eq!(after.left_distance_m, 0.0);
        assert_eq!(after.right_distance_m, 0.0);
        assert_eq!(after.heading_rad, 0.0);

        // Speeds are unaffected by zeroing
        assert_eq!(after.wheel_speeds, before.wheel_speeds);
    }

    #[test]
    fn test_sim_only_values() {
        let mut io = SimulatedSensors::new(sim());

        assert_eq!(io.current_draw_amps(), Some(0.0));
        assert_eq!(io.true_pose(), Some(Pose::identity()));
        assert!(io.step(-1.0).is_err());

        io.set_neutral_mode(NeutralMode::Coast);
        assert_eq!(io.neutral_mode(), NeutralMode::Coast);
    }
}
