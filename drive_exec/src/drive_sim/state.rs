//! Drivetrain simulator state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::*;
use crate::kinematics::{ChassisVelocity, KinematicsModel, Pose, WheelSpeeds};
use util::maths::{clamp, sign, wrap_angle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated differential drivetrain.
#[derive(Debug, Clone)]
pub struct DrivetrainSimulator {
    motor: DcMotor,

    kinematics: KinematicsModel,

    gearing: f64,
    wheel_radius_m: f64,
    supply_voltage_v: f64,

    /// Mode driven by the mean of the two wheel voltages
    linear: Mode,

    /// Mode driven by half the difference of the two wheel voltages
    angular: Mode,

    /// Currently applied voltages
    inputs_v: WheelSpeeds,

    state: SimulationState,
}

/// A first order velocity system `dv/dt = a*v + b*u`.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Mode {
    a: f64,
    b: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DrivetrainSimulator {
    /// Build a simulator from its parameters, starting at rest at the origin.
    pub fn new(params: &Params) -> Result<Self, DriveSimError> {
        let motor = DcMotor::new(params.motor.spec(), params.motors_per_side)?;

        let kinematics = KinematicsModel::new(params.track_width_m)
            .map_err(|e| DriveSimError::InvalidGeometry(e.to_string()))?;

        if !(params.gearing.is_finite() && params.gearing > 0.0) {
            return Err(DriveSimError::InvalidGeometry(format!(
                "gearing must be positive, found {}",
                params.gearing
            )));
        }
        if !(params.wheel_radius_m.is_finite() && params.wheel_radius_m > 0.0) {
            return Err(DriveSimError::InvalidGeometry(format!(
                "wheel radius must be positive, found {} m",
                params.wheel_radius_m
            )));
        }
        if !(params.supply_voltage_v.is_finite() && params.supply_voltage_v > 0.0) {
            return Err(DriveSimError::InvalidSupplyVoltage(params.supply_voltage_v));
        }

        let (linear, angular) = match params.plant {
            PlantParams::Characterised {
                kv_linear,
                ka_linear,
                kv_angular,
                ka_angular,
            } => {
                let gains_ok = [kv_linear, kv_angular].iter().all(|k| k.is_finite() && *k >= 0.0)
                    && [ka_linear, ka_angular].iter().all(|k| k.is_finite() && *k > 0.0);
                if !gains_ok {
                    return Err(DriveSimError::InvalidPlant(format!(
                        "characterisation gains must be non-negative with positive kA, found \
                         kV = {}, kA = {}, kV_ang = {}, kA_ang = {}",
                        kv_linear, ka_linear, kv_angular, ka_angular
                    )));
                }

                (
                    Mode {
                        a: -kv_linear / ka_linear,
                        b: 1.0 / ka_linear,
                    },
                    Mode {
                        a: -kv_angular / ka_angular,
                        b: 1.0 / ka_angular,
                    },
                )
            }
            PlantParams::Physical { mass_kg, moi_kgm2 } => {
                if !(mass_kg.is_finite() && mass_kg > 0.0 && moi_kgm2.is_finite() && moi_kgm2 > 0.0)
                {
                    return Err(DriveSimError::InvalidPlant(format!(
                        "mass and moment of inertia must be positive, found {} kg, {} kg m^2",
                        mass_kg, moi_kgm2
                    )));
                }

                let g = params.gearing;
                let r = params.wheel_radius_m;
                let rb = params.track_width_m / 2.0;

                // Back EMF and torque terms per unit wheel speed and voltage
                let c1 = -g * g * motor.kt_nm_per_a / (motor.kv_rads_per_v * motor.r_ohms * r * r);
                let c2 = g * motor.kt_nm_per_a / (motor.r_ohms * r);

                (
                    Mode {
                        a: 2.0 * c1 / mass_kg,
                        b: 2.0 * c2 / mass_kg,
                    },
                    Mode {
                        a: 2.0 * rb * rb * c1 / moi_kgm2,
                        b: 2.0 * rb * rb * c2 / moi_kgm2,
                    },
                )
            }
        };

        Ok(Self {
            motor,
            kinematics,
            gearing: params.gearing,
            wheel_radius_m: params.wheel_radius_m,
            supply_voltage_v: params.supply_voltage_v,
            linear,
            angular,
            inputs_v: WheelSpeeds::default(),
            state: SimulationState::default(),
        })
    }

    /// Set the voltages applied to each side, clamped to the supply.
    ///
    /// Non-finite demands are treated as zero.
    pub fn set_inputs(&mut self, left_v: f64, right_v: f64) {
        let limit = |v: f64| {
            if v.is_finite() {
                clamp(v, -self.supply_voltage_v, self.supply_voltage_v)
            }
            else {
                0.0
            }
        };

        self.inputs_v = WheelSpeeds::new(limit(left_v), limit(right_v));
    }

    /// Advance the simulation by `dt` seconds with the current inputs held.
    ///
    /// The state is left untouched if `dt` is negative or not finite.
    pub fn update(&mut self, dt: f64) -> Result<(), DriveSimError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(DriveSimError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }

        let s = self.state;
        let u = self.inputs_v;

        let (lin_pos, lin_vel) = self.linear.step(
            (s.left_position_m + s.right_position_m) / 2.0,
            (s.left_velocity_ms + s.right_velocity_ms) / 2.0,
            (u.left + u.right) / 2.0,
            dt,
        );
        let (ang_pos, ang_vel) = self.angular.step(
            (s.right_position_m - s.left_position_m) / 2.0,
            (s.right_velocity_ms - s.left_velocity_ms) / 2.0,
            (u.right - u.left) / 2.0,
            dt,
        );

        let left_position_m = lin_pos - ang_pos;
        let right_position_m = lin_pos + ang_pos;

        let twist = self.kinematics.to_twist(
            left_position_m - s.left_position_m,
            right_position_m - s.right_position_m,
        );
        let pose = self.true_pose().exp(&twist);

        self.state = SimulationState {
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading(),
            left_position_m,
            left_velocity_ms: lin_vel - ang_vel,
            right_position_m,
            right_velocity_ms: lin_vel + ang_vel,
        };

        trace!("Sim step {:.4} s: {:?}", dt, self.state);

        Ok(())
    }

    /// Total current drawn by both sides of the drive.
    pub fn get_current_draw_amps(&self) -> f64 {
        let side = |vel_ms: f64, volts: f64| {
            let motor_speed_rads = vel_ms / self.wheel_radius_m * self.gearing;
            self.motor.current_a(motor_speed_rads, volts) * sign(volts)
        };

        side(self.state.left_velocity_ms, self.inputs_v.left)
            + side(self.state.right_velocity_ms, self.inputs_v.right)
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Overwrite the simulation state.
    pub fn set_state(&mut self, state: SimulationState) {
        self.state = SimulationState {
            heading_rad: wrap_angle(state.heading_rad),
            ..state
        };
    }

    /// Place the robot at rest at `pose`, zeroing the wheel positions.
    pub fn reset(&mut self, pose: &Pose) {
        self.state = SimulationState {
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading(),
            ..SimulationState::default()
        };
    }

    /// The ground truth pose of the simulated robot.
    pub fn true_pose(&self) -> Pose {
        Pose::new(self.state.x_m, self.state.y_m, self.state.heading_rad)
    }

    pub fn inputs(&self) -> WheelSpeeds {
        self.inputs_v
    }

    pub fn wheel_speeds(&self) -> WheelSpeeds {
        WheelSpeeds::new(self.state.left_velocity_ms, self.state.right_velocity_ms)
    }

    pub fn chassis_velocity(&self) -> ChassisVelocity {
        self.kinematics.to_chassis_velocity(&self.wheel_speeds())
    }

    pub fn supply_voltage_v(&self) -> f64 {
        self.supply_voltage_v
    }
}

impl Mode {
    /// Advance `(position, velocity)` by `dt` with the input `u` held
    /// constant, using the exact solution of the system.
    fn step(&self, pos: f64, vel: f64, u: f64, dt: f64) -> (f64, f64) {
        let x = self.a * dt;

        // phi1 = (e^x - 1)/a, phi2 = (phi1 - dt)/a
        let (phi1, phi2) = if x.abs() < 1e-5 {
            (
                dt * (1.0 + x / 2.0 + x * x / 6.0),
                dt * dt * (0.5 + x / 6.0 + x * x / 24.0),
            )
        }
        else {
            let phi1 = x.exp_m1() / self.a;
            (phi1, (phi1 - dt) / self.a)
        };

        (
            pos + phi1 * vel + phi2 * self.b * u,
            x.exp() * vel + phi1 * self.b * u,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn characterised() -> Params {
        Params {
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
        }
    }

    fn physical() -> Params {
        Params {
            plant: PlantParams::Physical {
                mass_kg: 60.0,
                moi_kgm2: 6.0,
            },
            ..characterised()
        }
    }

    #[test]
    fn test_invalid_params() {
        let mut p = characterised();
        p.track_width_m = 0.0;
        assert!(DrivetrainSimulator::new(&p).is_err());

        let mut p = characterised();
        p.supply_voltage_v = -12.0;
        assert!(DrivetrainSimulator::new(&p).is_err());

        let mut p = characterised();
        p.plant = PlantParams::Characterised {
            kv_linear: 4.0,
            ka_linear: 0.0,
            kv_angular: 20.0,
            ka_angular: 10.0,
        };
        assert!(DrivetrainSimulator::new(&p).is_err());

        let mut p = physical();
        p.plant = PlantParams::Physical {
            mass_kg: -1.0,
            moi_kgm2: 6.0,
        };
        assert!(DrivetrainSimulator::new(&p).is_err());
    }

    #[test]
    fn test_inputs_clamped() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();

        sim.set_inputs(20.0, -20.0);
        assert_eq!(sim.inputs(), WheelSpeeds::new(12.0, -12.0));

        sim.set_inputs(std::f64::NAN, 3.0);
        assert_eq!(sim.inputs(), WheelSpeeds::new(0.0, 3.0));
    }

    #[test]
    fn test_determinism() {
        let mut a = DrivetrainSimulator::new(&characterised()).unwrap();
        let mut b = DrivetrainSimulator::new(&characterised()).unwrap();

        for i in 0..100 {
            let t = i as f64 * 0.02;
            let (l, r) = (6.0 * (t * 1.3).sin(), 4.0 + 3.0 * (t * 0.7).cos());

            a.set_inputs(l, r);
            b.set_inputs(l, r);
            a.update(0.02).unwrap();
            b.update(0.02).unwrap();
        }

        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_straight_line() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();
        sim.set_inputs(6.0, 6.0);

        for _ in 0..100 {
            sim.update(0.02).unwrap();
        }

        let s = sim.state();
        assert!(s.left_position_m > 0.0);
        assert_eq!(s.left_position_m, s.right_position_m);
        assert_eq!(s.y_m, 0.0);
        assert_eq!(s.heading_rad, 0.0);
        assert!((s.x_m - s.left_position_m).abs() < 1e-9);
    }

    #[test]
    fn test_steady_state_velocity() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();
        sim.set_inputs(12.0, 12.0);

        for _ in 0..1000 {
            sim.update(0.02).unwrap();
        }

        // In steady state the back EMF balances the applied voltage
        let expected = 12.0 / 4.009;
        assert!((sim.wheel_speeds().left - expected).abs() < 1e-6);
        assert!((sim.wheel_speeds().right - expected).abs() < 1e-6);
    }

    #[test]
    fn test_step_size_independent() {
        let mut coarse = DrivetrainSimulator::new(&physical()).unwrap();
        let mut fine = DrivetrainSimulator::new(&physical()).unwrap();

        coarse.set_inputs(5.0, 3.0);
        fine.set_inputs(5.0, 3.0);

        coarse.update(1.0).unwrap();
        for _ in 0..50 {
            fine.update(0.02).unwrap();
        }

        let (c, f) = (coarse.state(), fine.state());
        assert!((c.left_position_m - f.left_position_m).abs() < 1e-9);
        assert!((c.right_position_m - f.right_position_m).abs() < 1e-9);
        assert!((c.left_velocity_ms - f.left_velocity_ms).abs() < 1e-9);
        assert!((c.right_velocity_ms - f.right_velocity_ms).abs() < 1e-9);
        assert!((c.heading_rad - f.heading_rad).abs() < 1e-9);
    }

    #[test]
    fn test_turn_in_place() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();
        sim.set_inputs(-4.0, 4.0);

        for _ in 0..25 {
            sim.update(0.02).unwrap();
        }

        let s = sim.state();
        assert!(s.heading_rad > 0.0);
        assert!(s.x_m.abs() < 1e-9);
        assert!(s.y_m.abs() < 1e-9);
    }

    #[test]
    fn test_invalid_time_step() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();
        sim.set_inputs(6.0, 6.0);
        sim.update(0.02).unwrap();
        let before = *sim.state();

        assert!(sim.update(-0.02).is_err());
        assert!(sim.update(std::f64::NAN).is_err());
        assert!(sim.update(std::f64::INFINITY).is_err());
        assert_eq!(*sim.state(), before);

        sim.update(0.0).unwrap();
        assert_eq!(*sim.state(), before);
    }

    #[test]
    fn test_current_draw() {
        let mut sim = DrivetrainSimulator::new(&physical()).unwrap();
        assert_eq!(sim.get_current_draw_amps(), 0.0);

        // Stalled at full voltage, two Falcons per side
        sim.set_inputs(12.0, 12.0);
        assert!((sim.get_current_draw_amps() - 4.0 * 257.0).abs() < 1e-6);

        // Current falls as the motors speed up
        for _ in 0..50 {
            sim.update(0.02).unwrap();
        }
        assert!(sim.get_current_draw_amps() < 4.0 * 257.0);
    }

    #[test]
    fn test_reset() {
        let mut sim = DrivetrainSimulator::new(&characterised()).unwrap();
        sim.set_inputs(6.0, 2.0);
        sim.update(0.5).unwrap();

        sim.reset(&Pose::new(1.0, 2.0, 0.5));

        assert_eq!(sim.true_pose(), Pose::new(1.0, 2.0, 0.5));
        assert_eq!(sim.state().left_position_m, 0.0);
        assert_eq!(sim.wheel_speeds(), WheelSpeeds::new(0.0, 0.0));
    }
}
