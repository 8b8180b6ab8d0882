//! Drive base parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::DriveBaseError;
use crate::drive_io::{EncoderConversion, NeutralMode};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drive base
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub track_width_m: f64,

    /// Voltage demands are clamped to +/- this value, and percent output
    /// demands are scaled by it.
    ///
    /// Units: volts
    pub supply_voltage_v: f64,

    /// Maximum rate of change of percent output demands.
    ///
    /// Units: 1/seconds
    pub acceleration_rate_limit: f64,

    /// Neutral mode applied at start up
    #[serde(default)]
    pub neutral_mode: NeutralMode,

    /// Conversion from encoder counts to wheel travel
    pub encoder: EncoderConversion,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    pub fn validate(&self) -> Result<(), DriveBaseError> {
        if !(self.supply_voltage_v.is_finite() && self.supply_voltage_v > 0.0) {
            return Err(DriveBaseError::InvalidSupplyVoltage(self.supply_voltage_v));
        }
        if !(self.acceleration_rate_limit.is_finite() && self.acceleration_rate_limit > 0.0) {
            return Err(DriveBaseError::InvalidRateLimit(self.acceleration_rate_limit));
        }
        if !self.encoder.is_valid() {
            return Err(DriveBaseError::InvalidEncoderConversion(self.encoder));
        }

        Ok(())
    }
}
