//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The executable runs the drive base against the drivetrain simulator, with a
//! simulated vision pipeline feeding latent pose measurements back in:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the simulated drive base and start the vision producer
//!     - Main loop:
//!         - Drive base cycle (sensing, estimation, control, actuation)
//!         - Publish the ground truth pose to the vision producer
//!         - Archive telemetry
//!
//! Run as `drive_exec [trajectory.json]`. With a trajectory the drive follows
//! it from its initial pose and the executable exits once it is finished.
//! Without one the drive holds position for a fixed time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use drive_lib::{
    data_store::DataStore,
    drive_base::{DriveBase, DriveParams},
    drive_io::SimulatedSensors,
    drive_sim::{self, DrivetrainSimulator},
    kinematics::Pose,
    pose_est,
    traj_ctrl::{self, Trajectory},
    vision_client::{
        self,
        sim::{SimVisionProducer, TruthFeed},
    },
};
use util::{
    archive::{Archived, Archiver},
    logger::{logger_init, LevelFilter},
    session::Session,
    time::MonotonicClock,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// How long to hold position when no trajectory is given.
const HOLD_DURATION_S: f64 = 5.0;

/// Exit if this many consecutive cycles overrun.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 500;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let drive_params = DriveParams {
        drive_base: util::params::load("drive_base.toml")
            .wrap_err("Could not load drive base params")?,
        pose_est: util::params::load::<pose_est::Params>("pose_est.toml")
            .wrap_err("Could not load pose estimator params")?,
        traj_ctrl: util::params::load::<traj_ctrl::Params>("traj_ctrl.toml")
            .wrap_err("Could not load trajectory control params")?,
    };
    let sim_params: drive_sim::Params =
        util::params::load("drive_sim.toml").wrap_err("Could not load drive simulator params")?;
    let vision_params: vision_client::sim::Params =
        util::params::load("vision_sim.toml").wrap_err("Could not load vision simulator params")?;

    info!("Exec parameters loaded");

    // ---- LOAD TRAJECTORY ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let trajectory = match args.len() {
        1 => {
            info!("No trajectory provided, holding position for {:.1} s\n", HOLD_DURATION_S);
            None
        }
        2 => {
            info!("Loading trajectory from \"{}\"", &args[1]);

            let t = Trajectory::load(&args[1]).wrap_err("Failed to load trajectory")?;

            info!(
                "Loaded trajectory lasts {:.02} s and contains {} states\n",
                t.total_time_s(),
                t.states().len()
            );

            Some(t)
        }
        n => return Err(eyre!("Expected either zero or one argument, found {}", n - 1)),
    };

    let start_pose = trajectory
        .as_ref()
        .map(|t| t.initial_pose())
        .unwrap_or_else(Pose::identity);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut sim = DrivetrainSimulator::new(&sim_params)
        .wrap_err("Failed to initialise the drivetrain simulator")?;
    sim.reset(&start_pose);
    info!("DrivetrainSimulator init complete");

    let clock = MonotonicClock::new();
    let (vision_tx, vision_rx) = vision_client::vision_channel();
    let truth = TruthFeed::new();

    let mut drive = DriveBase::new(
        drive_params,
        Box::new(SimulatedSensors::new(sim)),
        Box::new(clock),
        Box::new(vision_rx),
    )
    .wrap_err("Failed to initialise the DriveBase")?;
    drive.reset_odometry(start_pose);
    info!("DriveBase init complete");

    if let Some(t) = trajectory {
        drive
            .follow_trajectory(t)
            .wrap_err("Failed to begin following the trajectory")?;
    }

    let vision = SimVisionProducer::start(vision_params, truth.clone(), vision_tx)
        .wrap_err("Failed to start the simulated vision producer")?;
    info!("SimVisionProducer started");

    let mut ds = DataStore::new(
        Archiver::from_path(&session, "drive_tm.csv").wrap_err("Failed to create the archiver")?,
    );

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = Duration::from_secs_f64(CYCLE_PERIOD_S);
    let following = drive.is_following_trajectory();

    loop {
        let cycle_start_instant = Instant::now();

        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- DRIVE BASE ----

        drive.periodic().wrap_err("Error during drive base processing")?;

        let tm = drive.telemetry();

        // Truth is valid at the time of the cycle's simulation step
        if let Some(pose) = drive.true_pose() {
            truth.publish(pose, tm.time_s);
        }

        if ds.is_1_hz_cycle {
            info!(
                "Pose estimate: {}, vision applied: {}, dropped: {}",
                drive.get_pose(),
                tm.vision_applied,
                tm.vision_dropped
            );
        }

        // ---- WRITE ARCHIVES ----

        let elapsed_s = tm.time_s;
        ds.drive_tm = Some(tm);

        if let Err(e) = ds.write() {
            warn!("Could not archive drive telemetry: {}", e);
        }

        // ---- EXIT CONDITIONS ----

        if following && !drive.is_following_trajectory() {
            info!("Trajectory finished, stopping");
            break;
        }
        if !following && elapsed_s >= HOLD_DURATION_S {
            info!("Hold duration elapsed, stopping");
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match ds.cycle_end(cycle_period, cycle_dur) {
            Some(d) => thread::sleep(d),
            None => {
                if ds.num_consec_cycle_overruns > MAX_CONSEC_CYCLE_OVERRUNS {
                    return Err(eyre!(
                        "More than {} consecutive cycle overruns",
                        MAX_CONSEC_CYCLE_OVERRUNS
                    ));
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    drive.stop_drive();
    vision.stop();

    if let Some(p) = drive.true_pose() {
        info!("Final pose estimate: {}, ground truth: {}", drive.get_pose(), p);
    }

    info!("End of execution");

    Ok(())
}
