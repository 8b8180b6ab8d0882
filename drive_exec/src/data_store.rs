//! # Data Store
//!
//! Cycle bookkeeping for the drive executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use std::time::Duration;

// Internal
use crate::drive_base::DriveTm;
use util::archive::{ArchiveError, Archived, Archiver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of the cycle
    pub cycle_start_s: f64,

    /// Drive telemetry produced this cycle
    pub drive_tm: Option<DriveTm>,

    // Monitoring counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Archive of the drive telemetry
    pub tm_archiver: Archiver,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(tm_archiver: Archiver) -> Self {
        Self {
            tm_archiver,
            ..Default::default()
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the previous cycle's telemetry and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.drive_tm = None;

        self.cycle_start_s = util::session::get_elapsed_seconds();
    }

    /// Perform actions required at the end of a cycle.
    ///
    /// Returns how long to sleep before the next cycle should start, or `None`
    /// if the cycle overran.
    pub fn cycle_end(&mut self, cycle_period: Duration, cycle_dur: Duration) -> Option<Duration> {
        self.num_cycles += 1;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_cycle_overruns = 0;
                Some(d)
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                self.num_consec_cycle_overruns += 1;
                None
            }
        }
    }
}

impl Archived for DataStore {
    fn write(&mut self) -> Result<(), ArchiveError> {
        match self.drive_tm {
            Some(ref tm) => self.tm_archiver.serialise(tm),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_1_hz_flag() {
        let mut ds = DataStore::default();
        let mut flags = Vec::new();

        for _ in 0..100 {
            ds.cycle_start(50.0);
            flags.push(ds.is_1_hz_cycle);
            ds.cycle_end(Duration::from_millis(20), Duration::from_millis(1));
        }

        assert!(flags[0]);
        assert!(flags[50]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 2);
    }

    #[test]
    fn test_overruns() {
        let mut ds = DataStore::default();
        let period = Duration::from_millis(20);

        assert!(ds.cycle_end(period, Duration::from_millis(30)).is_none());
        assert!(ds.cycle_end(period, Duration::from_millis(25)).is_none());
        assert_eq!(ds.num_consec_cycle_overruns, 2);

        assert_eq!(
            ds.cycle_end(period, Duration::from_millis(5)),
            Some(Duration::from_millis(15))
        );
        assert_eq!(ds.num_consec_cycle_overruns, 0);
        assert_eq!(ds.num_cycles, 3);
    }

    #[test]
    fn test_write_without_tm() {
        // Nothing to write, so the uninitialised archiver is never touched
        let mut ds = DataStore::default();
        assert!(ds.write().is_ok());
    }
}
