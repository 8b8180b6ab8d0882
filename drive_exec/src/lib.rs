//! # Drive library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to
//! access items defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Data store - cycle bookkeeping and telemetry archiving for the executable
pub mod data_store;

/// Drive base - sequences sensing, estimation, control and actuation each cycle
pub mod drive_base;

/// Drive I/O - sensor and actuator strategies for real and simulated hardware
pub mod drive_io;

/// Drivetrain simulator - linear plant model of the drive
pub mod drive_sim;

/// Kinematics - differential drive kinematics and planar geometry
pub mod kinematics;

/// Pose estimation - odometry fused with latent vision measurements
pub mod pose_est;

/// Trajectory control - keeps the drive on the given trajectory
pub mod traj_ctrl;

/// Vision client - receives measurements from the vision pipeline
pub mod vision_client;
