//! Type-state builder for `ScanRunner` and generic `build_runner` constructor.
//!
//! The builder enforces at compile time that a stage, a lock-in and the
//! experiment parameters are provided before `build()` is available.
//! `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam_channel::Sender;
use xwaves_traits::clock::{Clock, MonotonicClock};
use xwaves_traits::{DelayStage, LockIn};

use crate::archive::ScanArchive;
use crate::average::LiveAverage;
use crate::config::{ExperimentParameters, RunnerCfg, TravelLimits};
use crate::error::{BuildError, Result};
use crate::packet::ScanEvent;
use crate::runner::{ScanOutcome, SessionOutcome};
use crate::scan_core::ScanCore;
use crate::status::{ScanState, StepStatus};

pub type DynStage = Box<dyn DelayStage + Send>;
pub type DynLockIn = Box<dyn LockIn + Send>;
pub type AbortCheck = Box<dyn Fn() -> bool + Send>;

// ── Public dynamic-dispatch wrapper ──────────────────────────────────────────

/// Scan runner over boxed devices.
pub struct ScanRunner {
    pub(crate) inner: ScanCore<DynStage, DynLockIn>,
}

impl core::fmt::Debug for ScanRunner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.inner.fmt(f)
    }
}

impl ScanRunner {
    /// Start building a ScanRunner.
    pub fn builder() -> ScanBuilder<Missing, Missing, Missing> {
        ScanBuilder::default()
    }

    pub fn state(&self) -> ScanState {
        self.inner.state()
    }

    pub fn params(&self) -> &ExperimentParameters {
        self.inner.params()
    }

    pub fn positions(&self) -> &[f64] {
        self.inner.positions()
    }

    pub fn history(&self) -> &[Vec<f64>] {
        self.inner.history()
    }

    pub fn completed_average(&self) -> Option<&[f64]> {
        self.inner.completed_average()
    }

    pub fn clear_history(&mut self) {
        self.inner.clear_history();
    }

    pub fn prepare(&mut self) -> Result<()> {
        self.inner.prepare()
    }

    /// Reset per-scan state. Call before each scan.
    pub fn begin(&mut self, scan_index: u32) {
        self.inner.begin(scan_index);
    }

    /// One iteration of the scan loop.
    pub fn step(&mut self) -> Result<StepStatus> {
        self.inner.step()
    }

    /// Run one full scan.
    pub fn run_scan(&mut self, scan_index: u32) -> Result<ScanOutcome> {
        crate::runner::run_scan(&mut self.inner, scan_index)
    }

    /// Run every configured scan.
    pub fn run_session(&mut self) -> Result<SessionOutcome> {
        crate::runner::run_session(&mut self.inner)
    }

    /// Access the generic core.
    pub fn core_mut(&mut self) -> &mut ScanCore<DynStage, DynLockIn> {
        &mut self.inner
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `ScanRunner`. All fields are validated on `build()`.
pub struct ScanBuilder<S, L, P> {
    stage: Option<DynStage>,
    lockin: Option<DynLockIn>,
    params: Option<ExperimentParameters>,
    limits: Option<TravelLimits>,
    runner: Option<RunnerCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    abort_check: Option<AbortCheck>,
    events: Option<Sender<ScanEvent>>,
    archive: Option<Box<dyn ScanArchive + Send>>,
    _s: PhantomData<S>,
    _l: PhantomData<L>,
    _p: PhantomData<P>,
}

impl Default for ScanBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            stage: None,
            lockin: None,
            params: None,
            limits: None,
            runner: None,
            clock: None,
            abort_check: None,
            events: None,
            archive: None,
            _s: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

/// Validate configuration and construct a `ScanCore` with the position list expanded.
///
/// This is the single source of truth for validation and construction,
/// used by both `ScanBuilder::try_build()` and `build_runner()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<S: DelayStage, L: LockIn>(
    stage: S,
    lockin: L,
    params: ExperimentParameters,
    limits: Option<TravelLimits>,
    runner: RunnerCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    abort_check: Option<AbortCheck>,
    events: Option<Sender<ScanEvent>>,
    archive: Option<Box<dyn ScanArchive + Send>>,
) -> Result<ScanCore<S, L>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !runner.settle_scale.is_finite() || runner.settle_scale < 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "settle_scale must be a finite value >= 0",
        )));
    }
    if let Some(lim) = &limits
        && !(lim.min_delay_ps < lim.max_delay_ps)
    {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "travel limits must satisfy min < max",
        )));
    }
    params
        .validate(limits.as_ref())
        .map_err(eyre::Report::new)?;

    // ── Precompute ───────────────────────────────────────────────────────────
    let positions = crate::sequencer::expand(&params.legs).map_err(eyre::Report::new)?;
    let settle = crate::util::secs_to_duration(params.settling_time_s() * runner.settle_scale);

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    tracing::debug!(
        experiment = %params.experiment_name,
        points = positions.len(),
        scans = params.num_scans,
        settle_ms = settle.as_millis() as u64,
        "scan runner built"
    );

    Ok(ScanCore {
        stage,
        lockin,
        params,
        runner,
        positions,
        settle,
        clock,
        abort_check,
        events,
        archive,
        state: ScanState::Idle,
        prepared: false,
        scan_index: 0,
        step_index: 0,
        actual: Vec::new(),
        magnitudes: Vec::new(),
        errors: Vec::new(),
        cached_noise: None,
        history: Vec::new(),
        average: LiveAverage::new(),
        last_timing: None,
    })
}

impl<S, L, P> ScanBuilder<S, L, P> {
    fn retag<S2, L2, P2>(self) -> ScanBuilder<S2, L2, P2> {
        ScanBuilder {
            stage: self.stage,
            lockin: self.lockin,
            params: self.params,
            limits: self.limits,
            runner: self.runner,
            clock: self.clock,
            abort_check: self.abort_check,
            events: self.events,
            archive: self.archive,
            _s: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }

    pub fn with_stage(mut self, stage: impl DelayStage + Send + 'static) -> ScanBuilder<Set, L, P> {
        self.stage = Some(Box::new(stage));
        self.retag()
    }

    pub fn with_lockin(mut self, lockin: impl LockIn + Send + 'static) -> ScanBuilder<S, Set, P> {
        self.lockin = Some(Box::new(lockin));
        self.retag()
    }

    pub fn with_parameters(mut self, params: ExperimentParameters) -> ScanBuilder<S, L, Set> {
        self.params = Some(params);
        self.retag()
    }

    /// Reject legs and time zero outside the stage travel.
    pub fn with_limits(mut self, limits: TravelLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_runner_cfg(mut self, runner: RunnerCfg) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Inject a custom clock (tests use a manually advanced one).
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Polled at the top of every step; `true` aborts the current scan.
    pub fn with_abort_check(mut self, check: impl Fn() -> bool + Send + 'static) -> Self {
        self.abort_check = Some(Box::new(check));
        self
    }

    /// Stream per-point packets and finished scans to a monitor.
    pub fn with_events(mut self, tx: Sender<ScanEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_archive(mut self, archive: impl ScanArchive + Send + 'static) -> Self {
        self.archive = Some(Box::new(archive));
        self
    }

    /// Build with runtime checks for missing pieces.
    pub fn try_build(self) -> Result<ScanRunner> {
        let stage = self
            .stage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStage))?;
        let lockin = self
            .lockin
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLockIn))?;
        let params = self
            .params
            .ok_or_else(|| eyre::Report::new(BuildError::MissingParameters))?;
        let inner = validate_and_build(
            stage,
            lockin,
            params,
            self.limits,
            self.runner.unwrap_or_default(),
            self.clock,
            self.abort_check,
            self.events,
            self.archive,
        )?;
        Ok(ScanRunner { inner })
    }
}

impl ScanBuilder<Set, Set, Set> {
    /// Only available once stage, lock-in and parameters are set.
    pub fn build(self) -> Result<ScanRunner> {
        self.try_build()
    }
}

/// Construct a statically dispatched `ScanCore`.
#[allow(clippy::too_many_arguments)]
pub fn build_runner<S: DelayStage, L: LockIn>(
    stage: S,
    lockin: L,
    params: ExperimentParameters,
    limits: Option<TravelLimits>,
    runner: Option<RunnerCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    abort_check: Option<AbortCheck>,
    events: Option<Sender<ScanEvent>>,
) -> Result<ScanCore<S, L>> {
    validate_and_build(
        stage,
        lockin,
        params,
        limits,
        runner.unwrap_or_default(),
        clock,
        abort_check,
        events,
        None,
    )
}

impl<S: DelayStage, L: LockIn> ScanCore<S, L> {
    /// Attach an archive after construction.
    pub fn set_archive(&mut self, archive: impl ScanArchive + Send + 'static) {
        self.archive = Some(Box::new(archive));
    }
}
