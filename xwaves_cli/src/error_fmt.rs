//! Human-readable error descriptions and structured JSON error formatting.

use xwaves_core::error::{BuildError, ScanError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    // The archive wraps an Io error; the context says more than the type.
    if lower.contains("already in use") {
        return format!(
            "What happened: The output directory already exists ({msg}).\nLikely causes: Another experiment with the same name started within the same minute.\nHow to fix: Wait a minute, change experiment_name, or pass --out to a different root."
        );
    }

    // Typed matches next
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingStage => {
                "What happened: No delay stage was provided to the scan engine.\nLikely causes: The stage driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the stage is created successfully and passed via with_stage(...).".to_string()
            }
            BuildError::MissingLockIn => {
                "What happened: No lock-in amplifier was provided to the scan engine.\nLikely causes: The lock-in driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the lock-in is created successfully and passed via with_lockin(...).".to_string()
            }
            BuildError::MissingParameters => {
                "What happened: Experiment parameters not set.\nLikely causes: No preset was loaded.\nHow to fix: Provide a preset (e.g., `xwaves scan --preset etc/experiment_preset.json`).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/xwaves.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScanError>() {
        return match se {
            ScanError::InvalidParameter(msg) => format!(
                "What happened: Invalid experiment parameter ({msg}).\nLikely causes: A leg with a non-positive step or end before start, an unsupported time constant, or positions outside the stage travel.\nHow to fix: Edit the preset (or [stage] travel limits) and rerun; `xwaves positions` shows the expanded list."
            ),
            ScanError::DivisionByZero => {
                "What happened: Zero length step size caused division by zero.\nLikely causes: A leg in the preset has step_ps = 0.\nHow to fix: Give every leg a positive step_ps.".to_string()
            }
            ScanError::DeviceTimeout(msg) => format!(
                "What happened: A device did not answer in time ({msg}).\nLikely causes: Stage travel slower than expected, cable unplugged, or move timeout too low.\nHow to fix: Check the connections and consider raising stage.move_timeout_ms."
            ),
            ScanError::DeviceCommunication(msg) => format!(
                "What happened: Device communication failed ({msg}).\nLikely causes: Controller powered off, wrong port, or link dropped mid-scan.\nHow to fix: Power-cycle the instrument, verify the port in the config, and start a new experiment. Completed scans were kept."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config or presets
    if lower.contains("invalid preset json") || lower.contains("loading preset") {
        return format!(
            "What happened: The experiment preset could not be read ({}).\nLikely causes: Missing file, malformed JSON, or missing keys (time_constant_s, filter_roll_off_db_per_oct, time_zero_ps, num_scans, legs).\nHow to fix: Generate a starter file with `xwaves preset --out FILE` and edit it.",
            err.root_cause()
        );
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for typed failures; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ScanError>() {
        Some(ScanError::InvalidParameter(_)) => 3,
        Some(ScanError::DivisionByZero) => 4,
        Some(ScanError::DeviceCommunication(_) | ScanError::DeviceTimeout(_)) => 5,
        _ if err.downcast_ref::<BuildError>().is_some() => 3,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<ScanError>() {
        Some(ScanError::InvalidParameter(_)) => "InvalidParameter",
        Some(ScanError::DivisionByZero) => "DivisionByZero",
        Some(ScanError::DeviceCommunication(_)) => "DeviceCommunication",
        Some(ScanError::DeviceTimeout(_)) => "DeviceTimeout",
        Some(ScanError::State(_)) => "State",
        Some(ScanError::Io(_)) => "Io",
        None if err.downcast_ref::<BuildError>().is_some() => "InvalidConfig",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
