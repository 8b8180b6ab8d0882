//! # Trajectory control module
//!
//! Trajectory control keeps the robot on a precomputed reference trajectory.
//!
//! Each cycle the reference is sampled at the time elapsed since the
//! trajectory began and compared with the estimated pose. The Ramsete
//! controller turns the pose error, together with the reference velocity and
//! curvature, into a chassis velocity which converges on the reference. This
//! is converted into wheel speed targets, and the voltage for each side is
//! the motor feed-forward for the target plus a PID correction on the
//! measured wheel speed.
//!
//! If the position or heading error grows beyond its limit the trajectory is
//! aborted and the drive stopped.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod state;
pub mod trajectory;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::Params;
pub use state::*;
pub use trajectory::*;
