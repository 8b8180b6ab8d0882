//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Threshold below which `sinc` and similar ratios use their limiting value.
const SMALL_ANGLE_RAD: f64 = 1e-9;

/// Clamp `value` into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Square a value while keeping its sign, used to soften joystick-style
/// demands around zero.
pub fn signed_square<T>(value: T) -> T
where
    T: Float
{
    value * value.abs()
}

/// Sign of `value`, returning zero for zero rather than the sign bit.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the canonical range (-pi, pi].
pub fn wrap_angle<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t: T = pi_t + pi_t;

    // Leave canonical angles untouched so that wrapping is idempotent
    if angle > -pi_t && angle <= pi_t {
        return angle;
    }

    let wrapped = pi_t - rem_euclid(pi_t - angle, tau_t);

    // Guard against the round-off case of rem_euclid returning tau
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// `sin(x)/x`, with the limiting value of 1 as `x` approaches zero.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < SMALL_ANGLE_RAD {
        1.0 - x * x / 6.0
    }
    else {
        x.sin() / x
    }
}

/// `(1 - cos(x))/x`, with the limiting value of 0 as `x` approaches zero.
pub fn cosc(x: f64) -> f64 {
    if x.abs() < SMALL_ANGLE_RAD {
        x / 2.0
    }
    else {
        (1.0 - x.cos()) / x
    }
}

/// Linear interpolation between `a` and `b`, `t` is not clamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_wrap_angle() {
        assert_eq!(wrap_angle(0f64), 0f64);
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < 1e-12);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < 1e-12);
        assert!((wrap_angle(7.0 * PI / 2.0) - (-PI / 2.0)).abs() < 1e-12);
        assert!((wrap_angle(1.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_sinc_limit() {
        assert_eq!(sinc(0.0), 1.0);
        assert!((sinc(1e-12) - 1.0).abs() < 1e-15);
        assert!((sinc(PI / 2.0) - 2.0 / PI).abs() < 1e-12);
        assert!(cosc(0.0).abs() < 1e-15);
    }

    #[test]
    fn test_clamp_and_square() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.3, -1.0, 1.0), 0.3);
        assert_eq!(signed_square(-0.5), -0.25);
        assert_eq!(signed_square(0.5), 0.25);
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
    }
}
