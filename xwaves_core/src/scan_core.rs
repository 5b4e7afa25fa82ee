//! The scan state machine (`ScanCore`).
//!
//! One call to `step()` measures one position: abort check, move, settle,
//! optional autorange, magnitude read, optional noise read, live average,
//! packet. The call that measures the last position also publishes the scan
//! (history, archive, `ScanFinished` event).

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use eyre::WrapErr;
use xwaves_traits::{Clock, DelayStage, LockIn};

use crate::archive::ScanArchive;
use crate::average::LiveAverage;
use crate::config::{AutorangeMode, ErrorMeasurementMode, ExperimentParameters, RunnerCfg};
use crate::error::{Result, ScanError};
use crate::hw_error::device_report;
use crate::packet::{DataPacket, ScanArtifact, ScanEvent, StepTiming};
use crate::status::{ScanState, StepStatus};
use crate::util::secs_between;

/// Unified core for both dynamic (boxed) and generic (static dispatch) variants.
pub struct ScanCore<S: DelayStage, L: LockIn> {
    pub(crate) stage: S,
    pub(crate) lockin: L,
    pub(crate) params: ExperimentParameters,
    pub(crate) runner: RunnerCfg,
    pub(crate) positions: Vec<f64>,
    pub(crate) settle: Duration,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) abort_check: Option<Box<dyn Fn() -> bool + Send>>,
    pub(crate) events: Option<Sender<ScanEvent>>,
    pub(crate) archive: Option<Box<dyn ScanArchive + Send>>,

    pub(crate) state: ScanState,
    pub(crate) prepared: bool,
    pub(crate) scan_index: u32,
    pub(crate) step_index: usize,
    pub(crate) actual: Vec<f64>,
    pub(crate) magnitudes: Vec<f64>,
    pub(crate) errors: Vec<f64>,
    pub(crate) cached_noise: Option<f64>,
    pub(crate) history: Vec<Vec<f64>>,
    pub(crate) average: LiveAverage,
    pub(crate) last_timing: Option<StepTiming>,
}

impl<S: DelayStage, L: LockIn> core::fmt::Debug for ScanCore<S, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScanCore")
            .field("experiment", &self.params.experiment_name)
            .field("state", &self.state)
            .field("scan_index", &self.scan_index)
            .field("step_index", &self.step_index)
            .field("points", &self.positions.len())
            .field("completed_scans", &self.history.len())
            .finish()
    }
}

impl<S: DelayStage, L: LockIn> ScanCore<S, L> {
    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn params(&self) -> &ExperimentParameters {
        &self.params
    }

    /// Expanded position list shared by every scan.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn settle_duration(&self) -> Duration {
        self.settle
    }

    pub fn scan_index(&self) -> u32 {
        self.scan_index
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Magnitudes of every completed scan, oldest first.
    pub fn history(&self) -> &[Vec<f64>] {
        &self.history
    }

    /// Mean of completed scans, if any.
    pub fn completed_average(&self) -> Option<&[f64]> {
        self.average.completed_mean()
    }

    /// Timing of the most recent measured point.
    pub fn last_timing(&self) -> Option<StepTiming> {
        self.last_timing
    }

    /// Drop all completed scans. The caller does this between sessions.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.average.clear();
    }

    /// Apply lock-in settings and, if requested, range once at time zero.
    /// Runs once per session; `step()` calls it lazily when needed.
    pub fn prepare(&mut self) -> Result<()> {
        self.state = ScanState::Preparing;
        let res = self.prepare_devices();
        self.state = if res.is_ok() {
            ScanState::Idle
        } else {
            ScanState::Failed
        };
        res
    }

    /// Reset per-scan state. Call before each scan.
    pub fn begin(&mut self, scan_index: u32) {
        self.scan_index = scan_index;
        self.step_index = 0;
        self.actual.clear();
        self.magnitudes.clear();
        self.errors.clear();
        self.last_timing = None;
        self.state = ScanState::Idle;
    }

    /// One iteration of the scan loop. Abort is checked before any device I/O,
    /// including the lazy `prepare()`.
    pub fn step(&mut self) -> Result<StepStatus> {
        if self.state.is_terminal() || self.step_index >= self.positions.len() {
            return Err(eyre::Report::new(ScanError::State(format!(
                "scan {} is {:?}; call begin() before stepping again",
                self.scan_index, self.state
            ))));
        }
        if self.abort_requested() {
            tracing::warn!(
                scan_index = self.scan_index,
                step_index = self.step_index,
                discarded_points = self.magnitudes.len(),
                "scan aborted"
            );
            self.magnitudes.clear();
            self.actual.clear();
            self.errors.clear();
            self.state = ScanState::Aborted;
            return Ok(StepStatus::Aborted {
                scan_index: self.scan_index,
                step_index: self.step_index,
            });
        }

        if !self.prepared {
            self.prepare()?;
        }

        let res = self.measure_point();
        if res.is_err() {
            self.state = ScanState::Failed;
        }
        res
    }

    /// Hand the session-wide average to the archive. Call once after the last scan.
    pub fn finish_session(&mut self) -> Result<()> {
        if let Some(archive) = self.archive.as_mut() {
            archive
                .finish(&self.positions, self.average.completed_mean())
                .wrap_err("finalizing archive")?;
        }
        Ok(())
    }

    // ── Private: device sequencing ───────────────────────────────────────────

    pub(crate) fn abort_requested(&self) -> bool {
        self.abort_check.as_ref().is_some_and(|f| f())
    }

    fn prepare_devices(&mut self) -> Result<()> {
        let tc = self.params.time_constant_s;
        let db = self.params.filter_slope.db_per_octave();
        self.lockin
            .set_time_constant(tc)
            .map_err(|e| device_report(&e))
            .wrap_err("set_time_constant")?;
        self.lockin
            .set_filter_slope(db)
            .map_err(|e| device_report(&e))
            .wrap_err("set_filter_slope")?;

        if self.runner.home_on_start {
            self.stage
                .home()
                .map_err(|e| device_report(&e))
                .wrap_err("homing stage")?;
        }

        if self.params.autorange_mode == AutorangeMode::OnceAtTimeZero {
            let t0 = self.params.time_zero_ps;
            self.stage
                .move_to(t0)
                .map_err(|e| device_report(&e))
                .wrap_err_with(|| format!("moving stage to time zero ({t0} ps)"))?;
            self.clock.sleep(self.settle);
            self.range_and_resensitize()?;
        }

        self.cached_noise = None;
        self.prepared = true;
        tracing::info!(
            time_constant_s = tc,
            filter_slope_db = db,
            settle_ms = self.settle.as_millis() as u64,
            points = self.positions.len(),
            "lock-in prepared"
        );
        Ok(())
    }

    fn range_and_resensitize(&mut self) -> Result<()> {
        self.state = ScanState::Autoranging;
        self.lockin
            .autorange()
            .map_err(|e| device_report(&e))
            .wrap_err("autorange")?;
        let sensitivity = self
            .lockin
            .find_next_sensitivity()
            .map_err(|e| device_report(&e))
            .wrap_err("find_next_sensitivity")?;
        self.lockin
            .set_sensitivity(sensitivity)
            .map_err(|e| device_report(&e))
            .wrap_err("set_sensitivity")?;
        tracing::debug!(sensitivity_v = sensitivity, "lock-in resensitized");
        Ok(())
    }

    fn read_noise(&mut self) -> Result<f64> {
        self.state = ScanState::MeasuringError;
        self.lockin
            .read_noise()
            .map_err(|e| device_report(&e))
            .wrap_err("read_noise")
    }

    fn measure_point(&mut self) -> Result<StepStatus> {
        let target = self.positions[self.step_index];

        self.state = ScanState::Moving;
        let t_move = self.clock.now();
        let actual = self
            .stage
            .move_to(target)
            .map_err(|e| device_report(&e))
            .wrap_err_with(|| format!("moving stage to {target} ps"))?;

        self.state = ScanState::Settling;
        let t_settle = self.clock.now();
        self.clock.sleep(self.settle);

        let t_measure = self.clock.now();
        if self.params.autorange_mode == AutorangeMode::EveryPoint {
            self.range_and_resensitize()?;
        }

        self.state = ScanState::Measuring;
        let magnitude = self
            .lockin
            .read_magnitude()
            .map_err(|e| device_report(&e))
            .wrap_err("read_magnitude")?;

        let error = match self.params.error_mode {
            ErrorMeasurementMode::Never => None,
            ErrorMeasurementMode::EveryPoint => Some(self.read_noise()?),
            ErrorMeasurementMode::Once => match self.cached_noise {
                Some(v) => Some(v),
                None => {
                    let v = self.read_noise()?;
                    self.cached_noise = Some(v);
                    Some(v)
                }
            },
        };
        let t_done = self.clock.now();

        let timing = StepTiming {
            move_s: secs_between(t_move, t_settle),
            settle_s: secs_between(t_settle, t_measure),
            measure_s: secs_between(t_measure, t_done),
        };
        self.last_timing = Some(timing);

        self.actual.push(actual);
        self.magnitudes.push(magnitude);
        if let Some(e) = error {
            self.errors.push(e);
        }

        self.state = ScanState::Publishing;
        let packet = DataPacket {
            scan_index: self.scan_index,
            step_index: self.step_index,
            total_steps: self.positions.len(),
            position_ps: target,
            actual_position_ps: actual,
            magnitude,
            error,
            live_average: self.average.current(&self.magnitudes),
            timing,
        };
        self.emit(ScanEvent::Step(packet));
        tracing::debug!(
            scan_index = self.scan_index,
            step_index = self.step_index,
            position_ps = target,
            magnitude,
            "point measured"
        );

        self.step_index += 1;
        if self.step_index < self.positions.len() {
            self.state = ScanState::Idle;
            return Ok(StepStatus::Running);
        }
        self.publish_scan()
    }

    fn publish_scan(&mut self) -> Result<StepStatus> {
        let magnitudes = std::mem::take(&mut self.magnitudes);
        let artifact = ScanArtifact {
            scan_index: self.scan_index,
            positions: self.positions.clone(),
            actual_positions: std::mem::take(&mut self.actual),
            live_average: self.average.current(&magnitudes),
            errors: (self.params.error_mode != ErrorMeasurementMode::Never)
                .then(|| std::mem::take(&mut self.errors)),
            magnitudes: magnitudes.clone(),
        };

        self.average
            .push_completed(&magnitudes)
            .map_err(eyre::Report::new)?;
        self.history.push(magnitudes);

        if let Some(archive) = self.archive.as_mut() {
            archive.persist(&artifact).wrap_err("persisting scan")?;
        }
        self.emit(ScanEvent::ScanFinished(artifact.clone()));

        self.state = ScanState::Completed;
        tracing::info!(
            scan_index = self.scan_index,
            points = artifact.magnitudes.len(),
            completed_scans = self.history.len(),
            "scan complete"
        );
        Ok(StepStatus::ScanComplete(artifact))
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events
            && tx.send(event).is_err()
        {
            tracing::trace!("event consumer disconnected");
        }
    }
}
