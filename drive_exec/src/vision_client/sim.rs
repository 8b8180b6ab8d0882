//! # Simulated vision producer
//!
//! Stands in for the vision pipeline when running against the drivetrain
//! simulator. The control cycle publishes the ground truth pose along with
//! the time it is valid at. A background thread samples it, holds it for the
//! pipeline latency, then sends it with that timestamp.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, warn};
use serde::Deserialize;

use super::VisionSender;
use crate::{kinematics::Pose, pose_est::VisionMeasurement};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated vision pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Time between frames.
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Time between capturing a frame and it reaching the control cycle.
    ///
    /// Units: seconds
    pub latency_s: f64,

    /// Confidence reported with every measurement
    pub confidence: f64,
}

/// The latest ground truth pose and the time it is valid at, written by the
/// control cycle and read by the producer thread.
#[derive(Debug, Clone, Default)]
pub struct TruthFeed {
    pose: Arc<Mutex<Option<(Pose, f64)>>>,
}

/// Handle to the producer thread. The thread is stopped when this is
/// dropped.
pub struct SimVisionProducer {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimVisionError {
    #[error("Vision period must be positive and finite, found {0} s")]
    InvalidPeriod(f64),

    #[error("Vision latency must be in [0, period], found {0} s")]
    InvalidLatency(f64),

    #[error("Vision confidence must be in [0, 1], found {0}")]
    InvalidConfidence(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Params {
    pub fn validate(&self) -> Result<(), SimVisionError> {
        if !(self.period_s.is_finite() && self.period_s > 0.0) {
            return Err(SimVisionError::InvalidPeriod(self.period_s));
        }
        if !(self.latency_s >= 0.0 && self.latency_s <= self.period_s) {
            return Err(SimVisionError::InvalidLatency(self.latency_s));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SimVisionError::InvalidConfidence(self.confidence));
        }

        Ok(())
    }
}

impl TruthFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the ground truth pose at `timestamp_s`.
    pub fn publish(&self, pose: Pose, timestamp_s: f64) {
        match self.pose.lock() {
            Ok(mut p) => *p = Some((pose, timestamp_s)),
            Err(_) => warn!("TruthFeed mutex poisoned, pose not published"),
        }
    }

    /// The latest published pose and its timestamp, if any.
    pub fn latest(&self) -> Option<(Pose, f64)> {
        match self.pose.lock() {
            Ok(p) => *p,
            Err(_) => None,
        }
    }
}

impl SimVisionProducer {
    /// Start the producer thread.
    pub fn start(
        params: Params,
        truth: TruthFeed,
        sender: VisionSender,
    ) -> Result<Self, SimVisionError> {
        params.validate()?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let bg_run_clone = bg_run.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(params, truth, sender, bg_run_clone)
        }));

        Ok(Self { bg_jh, bg_run })
    }

    /// Stop the producer and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                warn!("Simulated vision thread panicked");
            }
        }
    }
}

impl Drop for SimVisionProducer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Take a measurement of the latest ground truth, if one is available. The
/// measurement is stamped with the time the truth was published for.
pub fn capture(truth: &TruthFeed, confidence: f64) -> Option<VisionMeasurement> {
    truth
        .latest()
        .map(|(pose, timestamp_s)| VisionMeasurement::new(pose, timestamp_s, confidence))
}

fn bg_thread(params: Params, truth: TruthFeed, sender: VisionSender, run: Arc<AtomicBool>) {
    let latency = Duration::from_secs_f64(params.latency_s);
    let rest = Duration::from_secs_f64(params.period_s - params.latency_s);

    while run.load(Ordering::Relaxed) {
        if let Some(m) = capture(&truth, params.confidence) {
            thread::sleep(latency);

            if sender.send(m).is_err() {
                debug!("Vision receiver dropped, stopping simulated vision");
                break;
            }
        }

        thread::sleep(rest);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vision_client::{vision_channel, VisionSource};

    fn params() -> Params {
        Params {
            period_s: 0.01,
            latency_s: 0.005,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_capture_stamps_truth_time() {
        let truth = TruthFeed::new();

        assert!(capture(&truth, 0.9).is_none());

        truth.publish(Pose::new(1.0, 2.0, 0.5), 3.25);

        // Captured later, but the pose is only valid at its own time
        thread::sleep(Duration::from_millis(5));
        let m = capture(&truth, 0.9).unwrap();
        assert_eq!(m.pose, Pose::new(1.0, 2.0, 0.5));
        assert_eq!(m.timestamp_s, 3.25);
        assert_eq!(m.confidence, 0.9);

        truth.publish(Pose::new(1.1, 2.0, 0.5), 3.27);
        assert_eq!(capture(&truth, 0.9).unwrap().timestamp_s, 3.27);
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params();
        p.latency_s = 0.02;
        assert!(p.validate().is_err());

        let mut p = params();
        p.period_s = -1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_producer_delivers() {
        let truth = TruthFeed::new();
        truth.publish(Pose::new(0.5, 0.0, 0.0), 1.0);
        let (tx, mut rx) = vision_channel();

        let producer = SimVisionProducer::start(params(), truth, tx).unwrap();

        let mut got = None;
        for _ in 0..200 {
            got = rx.poll();
            if got.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        producer.stop();

        assert_eq!(got.map(|m| (m.pose, m.timestamp_s)), Some((Pose::new(0.5, 0.0, 0.0), 1.0)));
    }
}
