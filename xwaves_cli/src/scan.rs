//! Experiment execution: config mapping, simulated device assembly, and the monitor loop.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use serde_json::json;
use xwaves_core::error::Result as CoreResult;
use xwaves_core::mocks::NullArchive;
use xwaves_core::{
    AbortFlag, CsvArchive, DataPacket, Estimate, EstimatorCfg, ExperimentParameters, RunStats,
    RunnerCfg, ScanArtifact, ScanEvent, ScanRunner, ScanSession, SessionOutcome, TravelLimits,
};
use xwaves_hardware::{SimSignal, SimStageCfg, SimulatedLockIn, SimulatedStage, simulated_pair};

/// Load a JSON preset and map it to validated-on-build parameters.
pub fn load_params(path: &Path, scans_override: Option<u32>) -> CoreResult<ExperimentParameters> {
    let preset = xwaves_config::load_preset_json(path)
        .wrap_err_with(|| format!("loading preset {}", path.display()))?;
    let mut params = ExperimentParameters::try_from(&preset).map_err(eyre::Report::new)?;
    if let Some(n) = scans_override {
        params.num_scans = n;
    }
    Ok(params)
}

pub fn runner_cfg(cfg: &xwaves_config::Config) -> RunnerCfg {
    RunnerCfg {
        settle_scale: cfg.simulation.time_scale,
        home_on_start: cfg.stage.home_on_start,
    }
}

/// Delay uncertainty written next to every exported point (ps).
pub fn time_error_ps(cfg: &xwaves_config::Config) -> f64 {
    xwaves_hardware::units::on_axis_error_ps(cfg.stage.on_axis_error_um)
}

pub fn sim_devices(cfg: &xwaves_config::Config) -> (SimulatedStage, SimulatedLockIn) {
    // Link settings only matter to real drivers.
    tracing::debug!(
        stage_serial = cfg.stage.serial_number.as_deref().unwrap_or("-"),
        stage_channel = cfg.stage.channel,
        lockin_port = cfg.lockin.port.as_deref().unwrap_or("-"),
        lockin_baud = cfg.lockin.baud_rate,
        lockin_timeout_ms = cfg.lockin.timeout_ms,
        "using simulated devices"
    );
    let stage_cfg = SimStageCfg {
        min_delay_ps: cfg.stage.min_delay_ps,
        max_delay_ps: cfg.stage.max_delay_ps,
        velocity_ps_per_s: cfg
            .stage
            .velocity_mm_per_s
            .map(xwaves_hardware::units::stage_mm_to_delay_ps),
        move_timeout: Duration::from_millis(cfg.stage.move_timeout_ms),
        on_axis_error_ps: time_error_ps(cfg),
        fail_after_moves: cfg.simulation.fail_after_moves,
    };
    let signal = SimSignal {
        time_zero_ps: cfg.simulation.time_zero_ps,
        amplitude_v: cfg.simulation.amplitude_v,
        decay_ps: cfg.simulation.decay_ps,
        baseline_v: cfg.simulation.baseline_v,
        noise_v: cfg.simulation.noise_v,
        seed: cfg.simulation.seed,
    };
    simulated_pair(stage_cfg, signal)
}

#[derive(Debug)]
pub struct ScanSummary {
    pub outcome: SessionOutcome,
    pub points_per_scan: usize,
    pub estimated_s: f64,
    pub elapsed_s: f64,
    pub output_dir: Option<PathBuf>,
    pub final_average: Option<Vec<f64>>,
}

pub struct ScanOptions<'a> {
    pub out: Option<&'a Path>,
    pub no_save: bool,
    pub stats: bool,
    pub json: bool,
}

/// Run a full session and stream progress until the scan thread finishes.
pub fn run_experiment(
    cfg: &xwaves_config::Config,
    params: ExperimentParameters,
    opts: &ScanOptions<'_>,
    abort: AbortFlag,
) -> CoreResult<ScanSummary> {
    let est_cfg = EstimatorCfg::from(&cfg.timing);
    let estimated_s = xwaves_core::estimate_params(&params, &est_cfg).map_err(eyre::Report::new)?;
    let estimate = Estimate::from_now(estimated_s, chrono::Local::now());
    tracing::info!(
        experiment = %params.experiment_name,
        estimated_s,
        "expected duration: {}",
        estimate.describe()
    );

    let (stage, lockin) = sim_devices(cfg);
    let (tx, rx) = crossbeam_channel::unbounded();
    let builder = ScanRunner::builder()
        .with_stage(stage)
        .with_lockin(lockin)
        .with_parameters(params.clone())
        .with_limits(TravelLimits::from(&cfg.stage))
        .with_runner_cfg(runner_cfg(cfg))
        .with_abort_check(abort.checker())
        .with_events(tx);

    let mut output_dir = None;
    let runner = if opts.no_save {
        builder.with_archive(NullArchive).build()?
    } else {
        // Validate before touching the file system.
        params
            .validate(Some(&TravelLimits::from(&cfg.stage)))
            .map_err(eyre::Report::new)?;
        let root = opts
            .out
            .map_or_else(|| PathBuf::from(&cfg.output.directory), Path::to_path_buf);
        let archive = CsvArchive::create(&root, &params, time_error_ps(cfg))?;
        output_dir = Some(archive.dir().to_path_buf());
        builder.with_archive(archive).build()?
    };
    let points_per_scan = runner.positions().len();

    let started = Instant::now();
    let session = ScanSession::spawn(runner, rx, abort);
    let poll = Duration::from_millis(cfg.output.poll_ms);
    let mut stats = RunStats::new();
    let mut final_average = None;
    loop {
        match session.next_event(poll) {
            Some(ev) => handle_event(ev, opts, &mut stats, &mut final_average),
            None if session.is_finished() => {
                for ev in session.drain() {
                    handle_event(ev, opts, &mut stats, &mut final_average);
                }
                break;
            }
            None => {}
        }
    }
    let outcome = session.join()?;
    let elapsed_s = started.elapsed().as_secs_f64();

    if opts.stats {
        print_stats(&stats, elapsed_s);
    }

    Ok(ScanSummary {
        outcome,
        points_per_scan,
        estimated_s,
        elapsed_s,
        output_dir,
        final_average,
    })
}

fn handle_event(
    ev: ScanEvent,
    opts: &ScanOptions<'_>,
    stats: &mut RunStats,
    final_average: &mut Option<Vec<f64>>,
) {
    match ev {
        ScanEvent::Step(p) => {
            stats.record(&p.timing);
            if opts.json {
                println!("{}", packet_json(&p));
            } else {
                tracing::debug!(
                    scan = p.scan_index + 1,
                    step = p.step_index + 1,
                    of = p.total_steps,
                    position_ps = p.position_ps,
                    magnitude = p.magnitude,
                    "point"
                );
            }
        }
        ScanEvent::ScanFinished(a) => {
            if !opts.json {
                println!("{}", scan_line(&a));
            }
            if a.live_average.is_some() {
                final_average.clone_from(&a.live_average);
            } else {
                *final_average = Some(a.magnitudes.clone());
            }
        }
    }
}

fn packet_json(p: &DataPacket) -> serde_json::Value {
    json!({
        "type": "point",
        "scan": p.scan_index,
        "step": p.step_index,
        "total_steps": p.total_steps,
        "position_ps": p.position_ps,
        "actual_position_ps": p.actual_position_ps,
        "magnitude_v": p.magnitude,
        "error_v": p.error,
        "live_average_v": p.live_average.as_ref().and_then(|v| v.get(p.step_index)),
        "move_s": p.timing.move_s,
        "settle_s": p.timing.settle_s,
        "measure_s": p.timing.measure_s,
    })
}

fn scan_line(a: &ScanArtifact) -> String {
    let peak = a.magnitudes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    format!(
        "scan {} complete: {} points, peak {:.3e} V",
        a.scan_index + 1,
        a.magnitudes.len(),
        peak
    )
}

pub fn summary_json(name: &str, s: &ScanSummary) -> serde_json::Value {
    let (outcome, at) = match &s.outcome {
        SessionOutcome::Completed { .. } => ("completed", None),
        SessionOutcome::Aborted {
            at_scan, at_step, ..
        } => ("aborted", Some(json!({ "scan": at_scan, "step": at_step }))),
    };
    json!({
        "type": "summary",
        "experiment": name,
        "outcome": outcome,
        "aborted_at": at,
        "completed_scans": s.outcome.completed_scans(),
        "points_per_scan": s.points_per_scan,
        "estimated_s": s.estimated_s,
        "elapsed_s": s.elapsed_s,
        "output_dir": s.output_dir.as_ref().map(|d| d.display().to_string()),
    })
}

/// Print per-phase timing stats to stderr.
fn print_stats(stats: &RunStats, elapsed_s: f64) {
    eprintln!("\n--- Scan Stats ---");
    eprintln!("Points: {}", stats.points());
    eprintln!("Elapsed (s): {elapsed_s:.3}");
    for (name, phase) in [
        ("Move", stats.moving()),
        ("Settle", stats.settling()),
        ("Measure", stats.measuring()),
    ] {
        if let Some(p) = phase {
            eprintln!(
                "{name} min/avg/max (ms): {:.2} / {:.2} / {:.2}",
                p.min_s * 1e3,
                p.avg_s * 1e3,
                p.max_s * 1e3
            );
        }
    }
    eprintln!("------------------\n");
}
