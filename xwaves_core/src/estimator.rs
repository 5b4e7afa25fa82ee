//! Advisory experiment duration estimate.
//!
//! per_step = move + settle + capture
//!          (+ noise measurement when errors are taken at every point)
//!          (+ autoscale/autorange when ranging at every point)
//! total    = sum over legs of steps(leg) * per_step * num_scans
//!          (+ one noise measurement when errors are taken once)
//!          (+ one autorange when ranging once at time zero)

use chrono::{DateTime, Duration as ChronoDuration, Local};

use crate::config::{
    AutorangeMode, EstimatorCfg, ErrorMeasurementMode, ExperimentParameters, LegDescriptor,
};
use crate::error::{ScanError, invalid};
use crate::lockin::FilterSlope;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// Estimated duration in seconds.
pub fn estimate(
    legs: &[LegDescriptor],
    time_constant_s: f64,
    filter_slope: FilterSlope,
    num_scans: u32,
    error_mode: ErrorMeasurementMode,
    autorange_mode: AutorangeMode,
    cfg: &EstimatorCfg,
) -> Result<f64, ScanError> {
    let mut steps = 0.0f64;
    for leg in legs {
        if leg.step_ps == 0.0 {
            return Err(ScanError::DivisionByZero);
        }
        if !(leg.step_ps.is_finite() && leg.start_ps.is_finite() && leg.end_ps.is_finite()) {
            return Err(invalid("leg bounds and step must be finite"));
        }
        steps += ((leg.end_ps - leg.start_ps) / leg.step_ps).ceil().max(0.0);
    }

    let mut per_step = cfg.move_s + filter_slope.settling_time_s(time_constant_s) + cfg.capture_s;
    if error_mode == ErrorMeasurementMode::EveryPoint {
        per_step += cfg.error_measurement_s;
    }
    if autorange_mode == AutorangeMode::EveryPoint {
        per_step += cfg.autorange_s;
    }

    let mut total = steps * per_step * f64::from(num_scans);
    if error_mode == ErrorMeasurementMode::Once {
        total += cfg.error_measurement_s;
    }
    if autorange_mode == AutorangeMode::OnceAtTimeZero {
        total += cfg.autorange_s;
    }
    Ok(total)
}

/// [`estimate`] over a full parameter set.
pub fn estimate_params(
    params: &ExperimentParameters,
    cfg: &EstimatorCfg,
) -> Result<f64, ScanError> {
    estimate(
        &params.legs,
        params.time_constant_s,
        params.filter_slope,
        params.num_scans,
        params.error_mode,
        params.autorange_mode,
        cfg,
    )
}

/// Duration plus the wall-clock time it is expected to end.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub seconds: f64,
    pub finish_at: DateTime<Local>,
}

impl Estimate {
    pub fn from_now(seconds: f64, now: DateTime<Local>) -> Self {
        let millis = (seconds * 1000.0).clamp(0.0, i64::MAX as f64 / 2.0) as i64;
        let finish_at = now
            .checked_add_signed(ChronoDuration::milliseconds(millis))
            .unwrap_or(now);
        Self { seconds, finish_at }
    }

    /// Operator-facing description, e.g. "12 minutes and 5 seconds, finishing at around 14:03:12".
    pub fn describe(&self) -> String {
        let span = humanize_duration(self.seconds);
        if self.seconds < HOUR {
            format!(
                "{span}, finishing at around {}",
                self.finish_at.format("%H:%M:%S")
            )
        } else if self.seconds < DAY {
            format!(
                "{span}, finishing at around {}",
                self.finish_at.format("%H:%M")
            )
        } else {
            format!("{span}, finishing on {}h", self.finish_at.format("%d/%m/%Y, %H"))
        }
    }
}

/// Human-readable duration with the precision an operator cares about.
pub fn humanize_duration(seconds: f64) -> String {
    let s = seconds.max(0.0);
    if s < MINUTE {
        format!("{} seconds", (s * 10.0).round() / 10.0)
    } else if s < HOUR {
        let mins = (s / MINUTE).floor();
        let secs = (s % MINUTE).floor();
        format!("{mins} minutes and {secs} seconds")
    } else if s < DAY {
        let hours = (s / HOUR).floor();
        let mins = ((s % HOUR) / MINUTE).floor();
        format!("{hours} hours and {mins} minutes")
    } else {
        format!("above {} days", (s / DAY).floor())
    }
}
