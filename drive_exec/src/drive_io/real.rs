//! [`DriveIo`] implementation for real hardware

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::{DriveIo, NeutralMode, SensorData};
use crate::kinematics::WheelSpeeds;
use util::maths::wrap_angle;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Raw interface to the motor controllers and gyro.
///
/// Values are in the hardware's native units and sign conventions: the
/// right-hand motors are mounted mirrored so positive counts and voltages
/// on that side drive backwards, and the gyro is clockwise positive.
pub trait DriveHal: Send {
    fn left_position_counts(&self) -> f64;
    fn right_position_counts(&self) -> f64;

    /// Counts per 100 ms
    fn left_velocity_counts(&self) -> f64;

    /// Counts per 100 ms
    fn right_velocity_counts(&self) -> f64;

    /// Clockwise positive, degrees
    fn gyro_angle_deg(&self) -> f64;

    /// Clockwise positive, degrees/second
    fn gyro_rate_degps(&self) -> f64;

    fn set_motor_voltages(&mut self, left_v: f64, right_v: f64);

    fn set_position_counts(&mut self, left: f64, right: f64);

    fn reset_gyro(&mut self);

    fn set_neutral_mode(&mut self, mode: NeutralMode);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Geometry needed to convert encoder counts into wheel travel.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct EncoderConversion {
    /// Encoder counts per motor revolution
    pub counts_per_rev: f64,

    /// Motor revolutions per wheel revolution
    pub gearing: f64,

    /// Units: meters
    pub wheel_radius_m: f64,
}

/// Sensors and actuators backed by real hardware.
pub struct RealSensors<H: DriveHal> {
    hal: H,
    meters_per_count: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EncoderConversion {
    /// Wheel travel per encoder count.
    pub fn meters_per_count(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.wheel_radius_m / (self.counts_per_rev * self.gearing)
    }

    pub fn is_valid(&self) -> bool {
        [self.counts_per_rev, self.gearing, self.wheel_radius_m]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

impl<H: DriveHal> RealSensors<H> {
    pub fn new(hal: H, conversion: &EncoderConversion) -> Self {
        Self {
            hal,
            meters_per_count: conversion.meters_per_count(),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }
}

impl<H: DriveHal> DriveIo for RealSensors<H> {
    fn read(&mut self) -> SensorData {
        let m = self.meters_per_count;

        // Velocities are reported per 100 ms
        SensorData {
            heading_rad: wrap_angle(-self.hal.gyro_angle_deg().to_radians()),
            turn_rate_rads: -self.hal.gyro_rate_degps().to_radians(),
            left_distance_m: self.hal.left_position_counts() * m,
            right_distance_m: -self.hal.right_position_counts() * m,
            wheel_speeds: WheelSpeeds::new(
                self.hal.left_velocity_counts() * m * 10.0,
                -self.hal.right_velocity_counts() * m * 10.0,
            ),
        }
    }

    fn set_voltages(&mut self, voltages: WheelSpeeds) {
        self.hal.set_motor_voltages(voltages.left, -voltages.right);
    }

    fn reset_encoders(&mut self) {
        self.hal.set_position_counts(0.0, 0.0);
    }

    fn zero_gyro(&mut self) {
        self.hal.reset_gyro();
    }

    fn set_neutral_mode(&mut self, mode: NeutralMode) {
        self.hal.set_neutral_mode(mode);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct MockHal {
        left_counts: f64,
        right_counts: f64,
        left_vel: f64,
        right_vel: f64,
        gyro_deg: f64,
        voltages: (f64, f64),
        neutral: Option<NeutralMode>,
    }

    impl DriveHal for MockHal {
        fn left_position_counts(&self) -> f64 { self.left_counts }
        fn right_position_counts(&self) -> f64 { self.right_counts }
        fn left_velocity_counts(&self) -> f64 { self.left_vel }
        fn right_velocity_counts(&self) -> f64 { self.right_vel }
        fn gyro_angle_deg(&self) -> f64 { self.gyro_deg }
        fn gyro_rate_degps(&self) -> f64 { 0.0 }
        fn set_motor_voltages(&mut self, left_v: f64, right_v: f64) {
            self.voltages = (left_v, right_v);
        }
        fn set_position_counts(&mut self, left: f64, right: f64) {
            self.left_counts = left;
            self.right_counts = right;
        }
        fn reset_gyro(&mut self) { self.gyro_deg = 0.0; }
        fn set_neutral_mode(&mut self, mode: NeutralMode) { self.neutral = Some(mode); }
    }

    fn conversion() -> EncoderConversion {
        EncoderConversion {
            counts_per_rev: 2048.0,
            gearing: 10.71,
            wheel_radius_m: 0.0762,
        }
    }

    #[test]
    fn test_unit_conversion() {
        let counts_per_wheel_rev = 2048.0 * 10.71;
        let hal = MockHal {
            left_counts: counts_per_wheel_rev,
            right_counts: -counts_per_wheel_rev,
            left_vel: counts_per_wheel_rev / 10.0,
            right_vel: -counts_per_wheel_rev / 10.0,
            gyro_deg: 90.0,
            ..MockHal::default()
        };
        let mut io = RealSensors::new(hal, &conversion());

        let data = io.read();
        let circumference = 2.0 * std::f64::consts::PI * 0.0762;

        // Both sides forward one wheel revolution
        assert!((data.left_distance_m - circumference).abs() < 1e-12);
        assert!((data.right_distance_m - circumference).abs() < 1e-12);
        assert!((data.wheel_speeds.left - circumference).abs() < 1e-12);
        assert!((data.wheel_speeds.right - circumference).abs() < 1e-12);

        // 90 degrees clockwise
        assert!((data.heading_rad + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_actuation() {
        let mut io = RealSensors::new(MockHal::default(), &conversion());

        io.set_voltages(WheelSpeeds::new(3.0, 4.0));
        assert_eq!(io.hal().voltages, (3.0, -4.0));

        io.set_neutral_mode(NeutralMode::Coast);
        assert_eq!(io.hal().neutral, Some(NeutralMode::Coast));
    }
}
