//! Configuration types for the scan engine.
//!
//! These are the runtime structs used by `ScanCore`. They are separate from
//! the TOML/JSON-deserialized documents in `xwaves_config`.

use crate::error::{ScanError, invalid};
use crate::lockin::{FilterSlope, time_constant_index};

/// One trip leg: absolute delays in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegDescriptor {
    pub start_ps: f64,
    pub end_ps: f64,
    pub step_ps: f64,
}

impl LegDescriptor {
    pub const fn new(start_ps: f64, end_ps: f64, step_ps: f64) -> Self {
        Self {
            start_ps,
            end_ps,
            step_ps,
        }
    }
}

/// When the noise of the magnitude is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMeasurementMode {
    #[default]
    Never,
    /// First step of the session; the value is reused for every point.
    Once,
    EveryPoint,
}

/// When the lock-in input range and sensitivity are re-adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutorangeMode {
    #[default]
    Never,
    /// Once during preparation, with the stage parked at time zero.
    OnceAtTimeZero,
    EveryPoint,
}

/// Everything one experiment needs. Checked once by [`ExperimentParameters::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParameters {
    pub experiment_name: String,
    pub time_constant_s: f64,
    pub filter_slope: FilterSlope,
    pub time_zero_ps: f64,
    pub num_scans: u32,
    pub legs: Vec<LegDescriptor>,
    pub error_mode: ErrorMeasurementMode,
    pub autorange_mode: AutorangeMode,
}

impl ExperimentParameters {
    /// Settling wait applied after every move, seconds.
    pub fn settling_time_s(&self) -> f64 {
        self.filter_slope.settling_time_s(self.time_constant_s)
    }

    /// Reject anything that would make the scan meaningless, before any device I/O.
    pub fn validate(&self, limits: Option<&TravelLimits>) -> Result<(), ScanError> {
        if time_constant_index(self.time_constant_s).is_none() {
            return Err(invalid(format!(
                "time constant {} s is not a supported lock-in setting",
                self.time_constant_s
            )));
        }
        if !xwaves_config::is_plain_file_name(&self.experiment_name)
            || self.experiment_name.trim().is_empty()
        {
            return Err(invalid(format!(
                "experiment_name {:?} must be a plain, non-empty name",
                self.experiment_name
            )));
        }
        if !self.time_zero_ps.is_finite() {
            return Err(invalid("time_zero_ps must be finite"));
        }
        if self.num_scans == 0 {
            return Err(invalid("num_scans must be >= 1"));
        }
        if self.legs.is_empty() {
            return Err(invalid("at least one leg is required"));
        }
        for (i, leg) in self.legs.iter().enumerate() {
            check_leg(leg).map_err(|e| match e {
                ScanError::InvalidParameter(m) => invalid(format!("leg {i}: {m}")),
                other => other,
            })?;
        }
        if let Some(lim) = limits {
            lim.check("time_zero_ps", self.time_zero_ps)?;
            for (i, leg) in self.legs.iter().enumerate() {
                lim.check(&format!("leg {i} start_ps"), leg.start_ps)?;
                lim.check(&format!("leg {i} end_ps"), leg.end_ps)?;
            }
        }
        Ok(())
    }
}

/// Shape checks for a single leg.
pub(crate) fn check_leg(leg: &LegDescriptor) -> Result<(), ScanError> {
    if !(leg.start_ps.is_finite() && leg.end_ps.is_finite() && leg.step_ps.is_finite()) {
        return Err(invalid("leg bounds and step must be finite"));
    }
    if leg.step_ps <= 0.0 {
        return Err(invalid(format!("step_ps must be > 0, got {}", leg.step_ps)));
    }
    if leg.end_ps < leg.start_ps {
        return Err(invalid(format!(
            "end_ps ({}) must be >= start_ps ({})",
            leg.end_ps, leg.start_ps
        )));
    }
    Ok(())
}

/// Reachable delay window of the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelLimits {
    pub min_delay_ps: f64,
    pub max_delay_ps: f64,
}

impl TravelLimits {
    fn check(&self, what: &str, ps: f64) -> Result<(), ScanError> {
        if ps < self.min_delay_ps || ps > self.max_delay_ps {
            return Err(invalid(format!(
                "{what} = {ps} ps is outside stage travel [{}, {}] ps",
                self.min_delay_ps, self.max_delay_ps
            )));
        }
        Ok(())
    }
}

/// Fixed overheads used by the duration estimator, seconds.
#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    /// Stage move per step.
    pub move_s: f64,
    /// Magnitude capture per step.
    pub capture_s: f64,
    /// One noise measurement.
    pub error_measurement_s: f64,
    /// One autoscale plus autorange (1.2 s + 0.1 s).
    pub autorange_s: f64,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            move_s: 2.2,
            capture_s: 1.1,
            error_measurement_s: 2.2,
            autorange_s: 1.3,
        }
    }
}

/// Runner behaviour that is not part of the experiment itself.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// Multiplier on settling sleeps. 1.0 for real devices; below 1 speeds up simulation.
    pub settle_scale: f64,
    /// Home the stage during preparation.
    pub home_on_start: bool,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            settle_scale: 1.0,
            home_on_start: false,
        }
    }
}
