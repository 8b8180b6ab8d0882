//! General time utility functions

use chrono;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

// ---------------------------------------------------------------------------
// CLOCKS
// ---------------------------------------------------------------------------

/// A source of timestamps in seconds.
///
/// All timestamps exchanged between the control cycle and asynchronous
/// producers (e.g. vision) must come from clones of the same clock.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the clock's epoch.
    fn now_s(&self) -> f64;
}

/// Wall clock measuring seconds since creation. Clones share the epoch.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

/// A clock which only moves when told to, used for simulation and tests.
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `dt_s` seconds. Negative steps are ignored.
    pub fn advance(&self, dt_s: f64) {
        if dt_s > 0.0 {
            self.nanos
                .fetch_add((dt_s * NANOS_PER_SECOND as f64).round() as u64, Ordering::SeqCst);
        }
    }

    /// Set the absolute time of the clock.
    pub fn set(&self, time_s: f64) {
        self.nanos.store(
            (time_s.max(0.0) * NANOS_PER_SECOND as f64).round() as u64,
            Ordering::SeqCst,
        );
    }
}

impl Clock for ManualClock {
    fn now_s(&self) -> f64 {
        self.nanos.load(Ordering::SeqCst) as f64 / NANOS_PER_SECOND as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.advance(0.02);
        clock.advance(-1.0);
        assert!((other.now_s() - 0.02).abs() < 1e-12);

        other.set(1.5);
        assert!((clock.now_s() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(1500);
        assert_eq!(duration_to_seconds(d), Some(1.5));
    }
}
