//! Slew rate limiting of percent output demands

use util::maths::clamp;

/// Limits how quickly a demand may change.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SlewRateLimiter {
    /// Units per second
    rate: f64,

    value: f64,
}

impl SlewRateLimiter {
    pub fn new(rate: f64) -> Self {
        Self { rate, value: 0.0 }
    }

    /// Move towards `input` by at most `rate * dt`, returning the new value.
    pub fn calculate(&mut self, input: f64, dt: f64) -> f64 {
        let max_step = self.rate * dt.max(0.0);
        self.value += clamp(input - self.value, -max_step, max_step);
        self.value
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f64) {
        self.value = value;
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slew() {
        let mut lim = SlewRateLimiter::new(1.5);

        assert!((lim.calculate(1.0, 0.02) - 0.03).abs() < 1e-12);
        assert!((lim.calculate(1.0, 0.02) - 0.06).abs() < 1e-12);

        // A long cycle is still bounded by the input
        assert_eq!(lim.calculate(1.0, 10.0), 1.0);

        // No time, no change
        assert_eq!(lim.calculate(-1.0, 0.0), 1.0);

        lim.reset(0.0);
        assert_eq!(lim.value(), 0.0);
    }
}
