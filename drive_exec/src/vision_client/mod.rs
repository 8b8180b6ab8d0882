//! # Vision Client
//!
//! The vision pipeline runs independently of the control cycle and at a
//! lower, irregular rate. Its measurements are pushed through a channel by
//! one or more producers holding a `VisionSender`, and the control cycle
//! drains them with a `VisionSource` when it is ready. This means the pose
//! estimator is only ever touched from the control cycle, while producers
//! may run on any thread.
//!
//! A cycle with no new measurement is normal, `poll` simply returns `None`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::pose_est::VisionMeasurement;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Anything the control cycle can pull vision measurements from.
pub trait VisionSource: Send {
    /// Get the next pending measurement, or `None` if there isn't one yet.
    fn poll(&mut self) -> Option<VisionMeasurement>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Producer side of the vision channel. Cheap to clone, one per producer.
#[derive(Debug, Clone)]
pub struct VisionSender {
    tx: Sender<VisionMeasurement>,
}

/// Consumer side of the vision channel, owned by the control cycle.
#[derive(Debug)]
pub struct VisionReceiver {
    rx: Receiver<VisionMeasurement>,
    disconnected: bool,
}

/// A source which never produces anything, for running on odometry alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVision;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionClientError {
    #[error("The vision receiver has been dropped")]
    Disconnected,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a new vision channel.
pub fn vision_channel() -> (VisionSender, VisionReceiver) {
    let (tx, rx) = mpsc::channel();

    (
        VisionSender { tx },
        VisionReceiver {
            rx,
            disconnected: false,
        },
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionSender {
    /// Push a measurement to the control cycle.
    pub fn send(&self, measurement: VisionMeasurement) -> Result<(), VisionClientError> {
        self.tx
            .send(measurement)
            .map_err(|_| VisionClientError::Disconnected)
    }
}

impl VisionReceiver {
    /// True once every sender has been dropped and the queue is empty.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl VisionSource for VisionReceiver {
    fn poll(&mut self) -> Option<VisionMeasurement> {
        match self.rx.try_recv() {
            Ok(m) => Some(m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.disconnected {
                    log::warn!("All vision producers have disconnected, tracking on odometry only");
                    self.disconnected = true;
                }
                None
            }
        }
    }
}

impl VisionSource for NoVision {
    fn poll(&mut self) -> Option<VisionMeasurement> {
        None
    }
}
