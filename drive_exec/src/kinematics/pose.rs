//! 2D rigid body pose and the differential motion (twist) between poses.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{cosc, sinc, wrap_angle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading in the world frame) of the robot.
///
/// The heading is always held wrapped into (-pi, pi], which is why it can
/// only be set through the constructors.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPose", into = "RawPose")]
pub struct Pose {
    /// The position in the world frame.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    heading_rad: f64,
}

/// A change in pose expressed in the frame of the starting pose.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    /// Forward motion, meters
    pub dx_m: f64,

    /// Leftwards motion, meters
    pub dy_m: f64,

    /// Change in heading, radians
    pub dtheta_rad: f64,
}

/// Flat serialised form of a pose.
#[derive(Serialize, Deserialize)]
struct RawPose {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, wrapping the heading into (-pi, pi].
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad: wrap_angle(heading_rad),
        }
    }

    /// The pose at the origin of the world frame facing along +X.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn x(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y(&self) -> f64 {
        self.position_m[1]
    }

    /// Heading (angle to the positive world X axis), in (-pi, pi].
    pub fn heading(&self) -> f64 {
        self.heading_rad
    }

    /// Return the same position with a different heading.
    pub fn with_heading(&self, heading_rad: f64) -> Self {
        Self::new(self.x(), self.y(), heading_rad)
    }

    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position_m, self.heading_rad)
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self::new(
            iso.translation.vector[0],
            iso.translation.vector[1],
            iso.rotation.angle(),
        )
    }

    /// Apply `other` as a transform expressed in this pose's frame.
    pub fn transform_by(&self, other: &Pose) -> Pose {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    /// Express this pose in the frame of `other`, i.e. `other^-1 * self`.
    pub fn relative_to(&self, other: &Pose) -> Pose {
        Self::from_isometry(&(other.to_isometry().inverse() * self.to_isometry()))
    }

    pub fn inverse(&self) -> Pose {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    /// Integrate a constant curvature twist starting at this pose.
    pub fn exp(&self, twist: &Twist) -> Pose {
        let s = sinc(twist.dtheta_rad);
        let c = cosc(twist.dtheta_rad);

        let delta = Pose::new(
            twist.dx_m * s - twist.dy_m * c,
            twist.dx_m * c + twist.dy_m * s,
            twist.dtheta_rad,
        );

        self.transform_by(&delta)
    }

    /// The constant curvature twist which takes this pose to `end`.
    pub fn log(&self, end: &Pose) -> Twist {
        let transform = end.relative_to(self);
        let dtheta = transform.heading();
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        }
        else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        Twist {
            dx_m: transform.x() * half_theta_by_tan + transform.y() * half_dtheta,
            dy_m: -transform.x() * half_dtheta + transform.y() * half_theta_by_tan,
            dtheta_rad: dtheta,
        }
    }

    /// Interpolate along the constant curvature arc between this pose and
    /// `end`. `t` is clamped into [0, 1].
    pub fn interpolate(&self, end: &Pose, t: f64) -> Pose {
        if t <= 0.0 {
            *self
        }
        else if t >= 1.0 {
            *end
        }
        else {
            self.exp(&self.log(end).scale(t))
        }
    }

    /// Euclidian distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position_m - self.position_m).norm()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(x: {:.3} m, y: {:.3} m, heading: {:.3} rad)",
            self.x(),
            self.y(),
            self.heading_rad
        )
    }
}

impl From<RawPose> for Pose {
    fn from(raw: RawPose) -> Self {
        Pose::new(raw.x_m, raw.y_m, raw.heading_rad)
    }
}

impl From<Pose> for RawPose {
    fn from(pose: Pose) -> Self {
        RawPose {
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading(),
        }
    }
}

impl Twist {
    pub fn new(dx_m: f64, dy_m: f64, dtheta_rad: f64) -> Self {
        Self { dx_m, dy_m, dtheta_rad }
    }

    pub fn scale(&self, factor: f64) -> Twist {
        Twist {
            dx_m: self.dx_m * factor,
            dy_m: self.dy_m * factor,
            dtheta_rad: self.dtheta_rad * factor,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_pose_near(a: &Pose, b: &Pose) {
        assert!(a.distance_to(b) < 1e-9, "{} != {}", a, b);
        assert!(wrap_angle(a.heading() - b.heading()).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_heading_wrapped_on_construction() {
        assert!((Pose::new(0.0, 0.0, 3.0 * PI).heading() - PI).abs() < 1e-12);
        assert!((Pose::new(0.0, 0.0, -FRAC_PI_2 - 2.0 * PI).heading() + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_relative_and_transform_are_inverse() {
        let a = Pose::new(1.0, 2.0, 0.3);
        let b = Pose::new(-4.0, 0.5, -2.9);

        let rel = b.relative_to(&a);
        assert_pose_near(&a.transform_by(&rel), &b);
        assert_pose_near(&a.relative_to(&a), &Pose::identity());
        assert_pose_near(&a.transform_by(&a.inverse()), &Pose::identity());
    }

    #[test]
    fn test_exp_quarter_circle() {
        // Drive a quarter circle of radius 1 to the left
        let twist = Twist::new(FRAC_PI_2, 0.0, FRAC_PI_2);
        let end = Pose::identity().exp(&twist);

        assert_pose_near(&end, &Pose::new(1.0, 1.0, FRAC_PI_2));
    }

    #[test]
    fn test_log_inverts_exp() {
        let start = Pose::new(2.0, -1.0, 0.7);
        let twist = Twist::new(1.3, 0.2, -0.4);
        let end = start.exp(&twist);
        let back = start.log(&end);

        assert!((back.dx_m - twist.dx_m).abs() < 1e-9);
        assert!((back.dy_m - twist.dy_m).abs() < 1e-9);
        assert!((back.dtheta_rad - twist.dtheta_rad).abs() < 1e-9);

        // Straight line has no rotation and takes the small angle branch
        let straight = Pose::identity().log(&Pose::new(3.0, 0.0, 0.0));
        assert!((straight.dx_m - 3.0).abs() < 1e-12);
        assert_eq!(straight.dtheta_rad, 0.0);
    }

    #[test]
    fn test_interpolate() {
        let start = Pose::identity();
        let end = Pose::new(2.0, 0.0, 0.0);

        assert_pose_near(&start.interpolate(&end, 0.5), &Pose::new(1.0, 0.0, 0.0));
        assert_pose_near(&start.interpolate(&end, -1.0), &start);
        assert_pose_near(&start.interpolate(&end, 4.0), &end);
    }

    #[test]
    fn test_serde_uses_flat_form() {
        let pose: Pose =
            serde_json::from_str(r#"{"x_m": 1.0, "y_m": 2.0, "heading_rad": 7.0}"#).unwrap();
        assert!((pose.heading() - (7.0 - 2.0 * PI)).abs() < 1e-12);

        let s = serde_json::to_string(&Pose::new(1.0, 2.0, 0.0)).unwrap();
        assert!(s.contains("\"x_m\":1.0"));
    }
}
