//! Scan and session drivers on top of `ScanCore::step()`.

use xwaves_traits::{DelayStage, LockIn};

use crate::error::Result;
use crate::packet::{ScanArtifact, StepTiming};
use crate::scan_core::ScanCore;
use crate::status::StepStatus;

/// How a single scan ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(ScanArtifact),
    /// Abort observed before `step_index` was measured; the partial scan was discarded.
    Aborted { scan_index: u32, step_index: usize },
}

/// How a whole session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed {
        scans: u32,
    },
    Aborted {
        completed_scans: u32,
        at_scan: u32,
        at_step: usize,
    },
}

impl SessionOutcome {
    pub fn completed_scans(&self) -> u32 {
        match *self {
            Self::Completed { scans } => scans,
            Self::Aborted {
                completed_scans, ..
            } => completed_scans,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Run one scan from its first position to its last.
pub fn run_scan<S: DelayStage, L: LockIn>(
    core: &mut ScanCore<S, L>,
    scan_index: u32,
) -> Result<ScanOutcome> {
    core.begin(scan_index);
    tracing::info!(
        scan_index,
        points = core.positions().len(),
        "scan start"
    );
    loop {
        match core.step()? {
            StepStatus::Running => continue,
            StepStatus::ScanComplete(artifact) => return Ok(ScanOutcome::Completed(artifact)),
            StepStatus::Aborted {
                scan_index,
                step_index,
            } => {
                return Ok(ScanOutcome::Aborted {
                    scan_index,
                    step_index,
                });
            }
        }
    }
}

/// Run all `num_scans` scans. Completed scans accumulate in the core's history.
///
/// The archive is finalized on both completion and abort. A device failure is
/// returned as an error after logging; completed scans stay persisted.
pub fn run_session<S: DelayStage, L: LockIn>(core: &mut ScanCore<S, L>) -> Result<SessionOutcome> {
    let num_scans = core.params().num_scans;
    tracing::info!(
        experiment = %core.params().experiment_name,
        scans = num_scans,
        points = core.positions().len(),
        "session start"
    );

    let res = drive_session(core, num_scans);
    match &res {
        Ok(outcome) => {
            core.finish_session()?;
            tracing::info!(
                completed_scans = outcome.completed_scans(),
                aborted = outcome.is_aborted(),
                "session finished"
            );
        }
        Err(e) => {
            if let Err(fin) = core.finish_session() {
                tracing::warn!(error = %fin, "archive finalization failed after error");
            }
            tracing::error!(error = %e, "session failed");
        }
    }
    res
}

fn drive_session<S: DelayStage, L: LockIn>(
    core: &mut ScanCore<S, L>,
    num_scans: u32,
) -> Result<SessionOutcome> {
    if !core.abort_requested() {
        core.prepare()?;
    }
    let mut completed = 0u32;
    for k in 0..num_scans {
        match run_scan(core, k)? {
            ScanOutcome::Completed(_) => completed += 1,
            ScanOutcome::Aborted {
                scan_index,
                step_index,
            } => {
                return Ok(SessionOutcome::Aborted {
                    completed_scans: completed,
                    at_scan: scan_index,
                    at_step: step_index,
                });
            }
        }
    }
    Ok(SessionOutcome::Completed { scans: completed })
}

/// Min/avg/max of one timing phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseStats {
    pub min_s: f64,
    pub avg_s: f64,
    pub max_s: f64,
}

/// Aggregates per-point timings for `--stats`.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    count: u64,
    sums: [f64; 3],
    mins: [f64; 3],
    maxs: [f64; 3],
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, t: &StepTiming) {
        let v = [t.move_s, t.settle_s, t.measure_s];
        for (i, x) in v.into_iter().enumerate() {
            if self.count == 0 {
                self.mins[i] = x;
                self.maxs[i] = x;
            } else {
                self.mins[i] = self.mins[i].min(x);
                self.maxs[i] = self.maxs[i].max(x);
            }
            self.sums[i] += x;
        }
        self.count += 1;
    }

    pub fn points(&self) -> u64 {
        self.count
    }

    fn phase(&self, i: usize) -> Option<PhaseStats> {
        if self.count == 0 {
            return None;
        }
        Some(PhaseStats {
            min_s: self.mins[i],
            avg_s: self.sums[i] / self.count as f64,
            max_s: self.maxs[i],
        })
    }

    pub fn moving(&self) -> Option<PhaseStats> {
        self.phase(0)
    }

    pub fn settling(&self) -> Option<PhaseStats> {
        self.phase(1)
    }

    pub fn measuring(&self) -> Option<PhaseStats> {
        self.phase(2)
    }
}
