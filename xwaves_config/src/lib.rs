#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and persistence formats for the delay-scan engine.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `ExperimentPreset` is the JSON document describing one experiment.
//! - `scan_csv` holds the per-scan CSV export schema with a strict header.
use serde::Deserialize;

pub mod preset;
pub mod scan_csv;

pub use preset::{
    AutorangeModeCfg, ErrorModeCfg, ExperimentPreset, LegPreset, is_plain_file_name,
    load_preset_json, parse_preset_json,
};
pub use scan_csv::{ScanRow, load_scan_csv, scan_csv_bytes};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StageCfg {
    /// Controller serial number and channel. Logged only; the simulated
    /// backend has no link to open.
    pub serial_number: Option<String>,
    pub channel: u8,
    /// Lower travel limit expressed as delay (ps).
    pub min_delay_ps: f64,
    /// Upper travel limit expressed as delay (ps).
    pub max_delay_ps: f64,
    /// Manufacturer on-axis accuracy in micrometres.
    pub on_axis_error_um: f64,
    /// Stage speed; absent means moves complete instantly in simulation.
    pub velocity_mm_per_s: Option<f64>,
    pub move_timeout_ms: u64,
    /// Home the stage once before the first scan.
    pub home_on_start: bool,
}

impl Default for StageCfg {
    fn default() -> Self {
        Self {
            serial_number: None,
            channel: 1,
            min_delay_ps: -100.0,
            max_delay_ps: 1000.0,
            on_axis_error_um: 12.0,
            velocity_mm_per_s: None,
            move_timeout_ms: 30_000,
            home_on_start: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LockInCfg {
    /// Serial link of the instrument (e.g. "/dev/ttyUSB0"). Validated and
    /// logged; the simulated lock-in answers without a link.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for LockInCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            timeout_ms: 2_000,
        }
    }
}

/// Fixed overheads (seconds) used by the duration estimator.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    pub move_s: f64,
    pub capture_s: f64,
    pub error_measurement_s: f64,
    /// Autoscale plus autorange.
    pub autorange_s: f64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            move_s: 2.2,
            capture_s: 1.1,
            error_measurement_s: 2.2,
            autorange_s: 1.3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    pub time_zero_ps: f64,
    pub amplitude_v: f64,
    pub decay_ps: f64,
    pub baseline_v: f64,
    pub noise_v: f64,
    pub seed: u64,
    /// Make the stage fail after this many moves (fault drills).
    pub fail_after_moves: Option<usize>,
    /// Scale factor applied to settling sleeps; 0 skips waiting entirely.
    pub time_scale: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            time_zero_ps: 0.0,
            amplitude_v: 5e-3,
            decay_ps: 20.0,
            baseline_v: 50e-6,
            noise_v: 20e-6,
            seed: 0x5eed_1234,
            fail_after_moves: None,
            time_scale: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputCfg {
    /// Root directory; each experiment gets its own sub-directory.
    pub directory: String,
    /// Monitor poll interval for streamed packets (ms).
    pub poll_ms: u64,
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            directory: "data".into(),
            poll_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stage: StageCfg,
    #[serde(default)]
    pub lockin: LockInCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub simulation: SimulationCfg,
    #[serde(default)]
    pub output: OutputCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stage
        if !self.stage.min_delay_ps.is_finite() || !self.stage.max_delay_ps.is_finite() {
            eyre::bail!("stage travel limits must be finite");
        }
        if self.stage.max_delay_ps <= self.stage.min_delay_ps {
            eyre::bail!("stage.max_delay_ps must be > stage.min_delay_ps");
        }
        if self.stage.on_axis_error_um.is_sign_negative() {
            eyre::bail!("stage.on_axis_error_um must be >= 0");
        }
        if let Some(v) = self.stage.velocity_mm_per_s
            && !(v > 0.0 && v.is_finite())
        {
            eyre::bail!("stage.velocity_mm_per_s must be > 0");
        }
        if self.stage.move_timeout_ms == 0 {
            eyre::bail!("stage.move_timeout_ms must be >= 1");
        }

        // Lock-in
        if self.lockin.baud_rate == 0 {
            eyre::bail!("lockin.baud_rate must be > 0");
        }
        if self.lockin.timeout_ms == 0 {
            eyre::bail!("lockin.timeout_ms must be >= 1");
        }

        // Timing
        for (name, v) in [
            ("timing.move_s", self.timing.move_s),
            ("timing.capture_s", self.timing.capture_s),
            ("timing.error_measurement_s", self.timing.error_measurement_s),
            ("timing.autorange_s", self.timing.autorange_s),
        ] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!("{name} must be a finite value >= 0");
            }
        }

        // Simulation
        if self.simulation.decay_ps <= 0.0 {
            eyre::bail!("simulation.decay_ps must be > 0");
        }
        if self.simulation.noise_v.is_sign_negative() {
            eyre::bail!("simulation.noise_v must be >= 0");
        }
        if !(0.0..=1.0).contains(&self.simulation.time_scale) {
            eyre::bail!("simulation.time_scale must be in [0.0, 1.0]");
        }

        // Output
        if self.output.directory.trim().is_empty() {
            eyre::bail!("output.directory must not be empty");
        }
        if self.output.poll_ms == 0 {
            eyre::bail!("output.poll_ms must be >= 1");
        }

        // Logging: rotation restricted to known policies
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
