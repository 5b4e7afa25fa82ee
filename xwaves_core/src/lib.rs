#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Time-resolved delay-scan engine (hardware-agnostic).
//!
//! All device interactions go through `xwaves_traits::DelayStage` and
//! `xwaves_traits::LockIn`.
//!
//! ## Architecture
//!
//! - **Sequencer**: legs → ordered list of absolute delays (`sequencer`)
//! - **Estimator**: advisory experiment duration and finish time (`estimator`)
//! - **Scan state machine**: move, settle, range, measure, publish (`ScanCore`)
//! - **Live average**: element-wise mean over completed scans plus the one in progress (`average`)
//! - **Sessions**: scans on a background thread with cooperative abort (`session`)
//! - **Archive**: per-scan CSV files, never overwritten (`archive`)
//!
//! Delays are in picoseconds, times in seconds, signals in volts rms.

pub mod archive;
pub mod atomic;
pub mod average;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod lockin;
pub mod mocks;
pub mod packet;
pub mod runner;
pub mod scan_core;
pub mod sequencer;
pub mod session;
pub mod status;
pub mod util;

pub use archive::{CsvArchive, ScanArchive};
pub use average::{LiveAverage, live_average};
pub use builder::{Missing, ScanBuilder, ScanRunner, Set, build_runner};
pub use config::{
    AutorangeMode, ErrorMeasurementMode, EstimatorCfg, ExperimentParameters, LegDescriptor,
    RunnerCfg, TravelLimits,
};
pub use error::{BuildError, Report, Result, ScanError};
pub use estimator::{Estimate, estimate, estimate_params, humanize_duration};
pub use lockin::FilterSlope;
pub use packet::{DataPacket, ScanArtifact, ScanEvent, StepTiming};
pub use runner::{RunStats, ScanOutcome, SessionOutcome, run_scan, run_session};
pub use scan_core::ScanCore;
pub use session::{AbortFlag, ScanSession};
pub use status::{ScanState, StepStatus};
