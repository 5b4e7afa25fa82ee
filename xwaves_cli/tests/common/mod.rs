#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

/// Simulated setup with no settling waits so runs finish instantly.
pub fn write_config(dir: &tempfile::TempDir, extra_simulation: &str) -> PathBuf {
    let toml = format!(
        r#"
[stage]
min_delay_ps = -50.0
max_delay_ps = 500.0
on_axis_error_um = 12.0
move_timeout_ms = 1000
home_on_start = true

[timing]
move_s = 2.0
capture_s = 1.0
error_measurement_s = 2.0
autorange_s = 1.0

[simulation]
noise_v = 0.0
time_scale = 0.0
{extra_simulation}

[output]
directory = "{out}"
poll_ms = 1
"#,
        out = dir.path().join("data").display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

/// Two legs: three positions from the first when `step_ps` is 1, then 10, 20 and 30 ps.
pub fn write_preset(dir: &tempfile::TempDir, scans: u32, step_ps: f64) -> PathBuf {
    let json = format!(
        r#"{{
  "experiment_name": "cli_test",
  "time_constant_s": 0.1,
  "filter_roll_off_db_per_oct": 24,
  "time_zero_ps": 0.0,
  "num_scans": {scans},
  "legs": [
    {{ "start_ps": 0.0, "end_ps": 2.0, "step_ps": {step_ps} }},
    {{ "start_ps": 10.0, "end_ps": 30.0, "step_ps": 10.0 }}
  ],
  "error_measurement_mode": "Once",
  "autorange_mode": "OnceAtTimeZero"
}}"#
    );
    let path = dir.path().join("preset.json");
    fs::write(&path, json).unwrap();
    path
}
