#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod scan;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use xwaves_core::error::Result;
use xwaves_core::{AbortFlag, Estimate, EstimatorCfg, SessionOutcome};
use xwaves_traits::{DelayStage, LockIn};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::scan::{ScanOptions, load_params, run_experiment, sim_devices, summary_json};

/// Aborted by the operator; completed scans were kept.
const EXIT_ABORTED: i32 = 2;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::error!(error = %e, "command failed");
            std::process::exit(exit_code_for_error(&e));
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Preset generation does not need a config file.
    if let Commands::Preset { out } = &cli.cmd {
        init_tracing(&cli, None)?;
        return write_preset(out);
    }

    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, Some(&cfg.logging))?;

    match &cli.cmd {
        Commands::Scan {
            preset,
            scans,
            out,
            no_save,
            stats,
        } => {
            let params = load_params(preset, *scans)?;
            let name = params.experiment_name.clone();

            let abort = AbortFlag::new();
            let handler_flag = abort.clone();
            if let Err(e) = ctrlc::set_handler(move || handler_flag.request()) {
                tracing::warn!(error = %e, "failed to install Ctrl-C handler; abort unavailable");
            }

            let opts = ScanOptions {
                out: out.as_deref(),
                no_save: *no_save,
                stats: *stats,
                json: cli.json,
            };
            let summary = run_experiment(&cfg, params, &opts, abort)?;

            if cli.json {
                println!("{}", summary_json(&name, &summary));
            } else {
                match &summary.outcome {
                    SessionOutcome::Completed { scans } => println!(
                        "{name}: {scans} scan(s) of {} points in {:.1} s",
                        summary.points_per_scan, summary.elapsed_s
                    ),
                    SessionOutcome::Aborted {
                        completed_scans,
                        at_scan,
                        at_step,
                    } => println!(
                        "{name}: aborted at scan {} step {} ({completed_scans} complete scan(s) kept)",
                        at_scan + 1,
                        at_step + 1
                    ),
                }
                if let Some(dir) = &summary.output_dir {
                    println!("Data written to {}", dir.display());
                }
            }
            Ok(if summary.outcome.is_aborted() {
                EXIT_ABORTED
            } else {
                0
            })
        }
        Commands::Estimate { preset } => {
            let params = load_params(preset, None)?;
            let seconds = xwaves_core::estimate_params(&params, &EstimatorCfg::from(&cfg.timing))
                .map_err(eyre::Report::new)?;
            let est = Estimate::from_now(seconds, chrono::Local::now());
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "type": "estimate",
                        "seconds": est.seconds,
                        "finish_at": est.finish_at.to_rfc3339(),
                    })
                );
            } else {
                println!("Expected duration: {}", est.describe());
            }
            Ok(0)
        }
        Commands::Positions { preset } => {
            let params = load_params(preset, None)?;
            let positions =
                xwaves_core::sequencer::expand(&params.legs).map_err(eyre::Report::new)?;
            if cli.json {
                println!("{}", serde_json::json!({ "positions_ps": positions }));
            } else {
                for p in &positions {
                    println!("{p}");
                }
                eprintln!("{} positions", positions.len());
            }
            Ok(0)
        }
        Commands::SelfCheck => self_check(&cfg),
        Commands::Preset { .. } => Ok(0),
    }
}

fn load_config(path: &Path) -> Result<xwaves_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = xwaves_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, logging: Option<&xwaves_config::Logging>) -> Result<()> {
    // RUST_LOG wins, then --log-level, then [logging].level.
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    if let Some(file) = logging.and_then(|l| l.file.as_deref()) {
        let path = Path::new(file);
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let dir = dir.unwrap_or_else(|| Path::new("."));
        let name = path.file_name().map_or_else(
            || std::ffi::OsString::from("xwaves.log"),
            std::ffi::OsStr::to_os_string,
        );
        let appender = match logging.and_then(|l| l.rotation.as_deref()) {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init();
    } else if cli.json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
    Ok(())
}

fn write_preset(out: &Path) -> Result<i32> {
    let text = xwaves_config::ExperimentPreset::default().to_json_pretty()?;
    xwaves_core::atomic::write_atomic_new(out, text.as_bytes())
        .wrap_err_with(|| format!("writing preset {}", out.display()))?;
    println!("Wrote starter preset to {}", out.display());
    Ok(0)
}

/// Config parses, the stage homes and reaches both travel limits, the lock-in answers.
fn self_check(cfg: &xwaves_config::Config) -> Result<i32> {
    let (mut stage, mut lockin) = sim_devices(cfg);
    stage
        .home()
        .map_err(|e| xwaves_core::hw_error::device_report(&e))
        .wrap_err("homing stage")?;
    for target in [cfg.stage.min_delay_ps, cfg.stage.max_delay_ps] {
        stage
            .move_to(target)
            .map_err(|e| xwaves_core::hw_error::device_report(&e))
            .wrap_err_with(|| format!("moving stage to {target} ps"))?;
    }
    let magnitude = lockin
        .read_magnitude()
        .map_err(|e| xwaves_core::hw_error::device_report(&e))
        .wrap_err("reading lock-in magnitude")?;
    tracing::info!(magnitude, "self-check passed");
    println!("OK");
    Ok(0)
}
