//! JSON experiment presets.
//!
//! Example:
//! ```json
//! {
//!   "experiment_name": "gaas_run1",
//!   "time_constant_s": 0.1,
//!   "filter_roll_off_db_per_oct": 24,
//!   "time_zero_ps": 0.0,
//!   "num_scans": 3,
//!   "legs": [{ "start_ps": -5.0, "end_ps": 20.0, "step_ps": 0.5 }],
//!   "error_measurement_mode": "Once",
//!   "autorange_mode": "OnceAtTimeZero"
//! }
//! ```
//! Shape checks only happen here; range checks belong to the scan engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPreset {
    pub start_ps: f64,
    pub end_ps: f64,
    pub step_ps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorModeCfg {
    #[default]
    Never,
    Once,
    EveryPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutorangeModeCfg {
    #[default]
    Never,
    OnceAtTimeZero,
    EveryPoint,
}

fn default_name() -> String {
    "experiment".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPreset {
    #[serde(default = "default_name")]
    pub experiment_name: String,
    pub time_constant_s: f64,
    pub filter_roll_off_db_per_oct: u8,
    pub time_zero_ps: f64,
    pub num_scans: u32,
    pub legs: Vec<LegPreset>,
    #[serde(default)]
    pub error_measurement_mode: ErrorModeCfg,
    #[serde(default)]
    pub autorange_mode: AutorangeModeCfg,
}

impl Default for ExperimentPreset {
    fn default() -> Self {
        Self {
            experiment_name: default_name(),
            time_constant_s: 0.1,
            filter_roll_off_db_per_oct: 24,
            time_zero_ps: 0.0,
            num_scans: 1,
            legs: vec![
                LegPreset {
                    start_ps: -5.0,
                    end_ps: 5.0,
                    step_ps: 0.25,
                },
                LegPreset {
                    start_ps: 5.0,
                    end_ps: 100.0,
                    step_ps: 5.0,
                },
            ],
            error_measurement_mode: ErrorModeCfg::Once,
            autorange_mode: AutorangeModeCfg::OnceAtTimeZero,
        }
    }
}

impl ExperimentPreset {
    /// Pretty JSON ready to be written to disk.
    pub fn to_json_pretty(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| eyre::eyre!("serialize preset: {e}"))
    }
}

/// True when `name` is usable as a single directory component.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\', '\0']) && name != "." && name != ".."
}

pub fn parse_preset_json(s: &str) -> eyre::Result<ExperimentPreset> {
    let preset: ExperimentPreset =
        serde_json::from_str(s).map_err(|e| eyre::eyre!("invalid preset JSON: {e}"))?;
    if preset.legs.is_empty() {
        eyre::bail!("preset must declare at least one leg");
    }
    if preset.experiment_name.trim().is_empty() {
        eyre::bail!("experiment_name must not be empty");
    }
    if !is_plain_file_name(&preset.experiment_name) {
        eyre::bail!(
            "experiment_name {:?} must be a plain name (no path separators or \"..\")",
            preset.experiment_name
        );
    }
    Ok(preset)
}

pub fn load_preset_json(path: &Path) -> eyre::Result<ExperimentPreset> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read preset {:?}: {}", path, e))?;
    parse_preset_json(&text)
}
