//! Background scan sessions.
//!
//! A `ScanSession` owns one thread that runs `run_session` on a built
//! `ScanRunner`. Per-point packets and finished scans arrive on an unbounded
//! channel; the channel disconnects once the thread is done with the runner.
//!
//! Dropping a session requests an abort and joins the thread, so a session
//! never outlives its owner.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::builder::{ScanBuilder, ScanRunner, Set};
use crate::error::Result;
use crate::packet::ScanEvent;
use crate::runner::SessionOutcome;

/// Cooperative abort request shared between the operator and the scan thread.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Closure suitable for `ScanBuilder::with_abort_check`.
    pub fn checker(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let flag = self.0.clone();
        move || flag.load(Ordering::Relaxed)
    }
}

type Joined = (ScanRunner, Result<SessionOutcome>);

pub struct ScanSession {
    rx: xch::Receiver<ScanEvent>,
    abort: AbortFlag,
    join_handle: Option<JoinHandle<Joined>>,
}

impl ScanSession {
    /// Build the runner with this session's event channel and abort flag, then start it.
    /// Any abort check or event sender already on the builder is replaced.
    pub fn start(builder: ScanBuilder<Set, Set, Set>) -> Result<Self> {
        let abort = AbortFlag::new();
        let (tx, rx) = xch::unbounded();
        let runner = builder
            .with_abort_check(abort.checker())
            .with_events(tx)
            .build()?;
        Ok(Self::spawn(runner, rx, abort))
    }

    /// Run an already built runner. `rx` must be the receiver of its event sender
    /// and `abort` the flag its abort check reads.
    pub fn spawn(mut runner: ScanRunner, rx: xch::Receiver<ScanEvent>, abort: AbortFlag) -> Self {
        let join_handle = std::thread::Builder::new()
            .name("xwaves-scan".into())
            .spawn(move || {
                let outcome = runner.run_session();
                // Release the event sender so the monitor sees a disconnect.
                runner.inner.events = None;
                tracing::trace!("scan thread exiting");
                (runner, outcome)
            });
        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn scan thread");
                None
            }
        };
        Self {
            rx,
            abort,
            join_handle,
        }
    }

    pub fn events(&self) -> &xch::Receiver<ScanEvent> {
        &self.rx
    }

    /// Wait up to `timeout` for the next event. `None` on timeout or once the
    /// scan thread is gone and the channel is drained.
    pub fn next_event(&self, timeout: Duration) -> Option<ScanEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<ScanEvent> {
        self.rx.try_iter().collect()
    }

    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Ask the scan thread to stop before the next point.
    pub fn abort(&self) {
        self.abort.request();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the session to end and return its outcome.
    pub fn join(self) -> Result<SessionOutcome> {
        self.join_with_runner().map(|(_, outcome)| outcome)
    }

    /// Like [`ScanSession::join`] but also hands back the runner, e.g. to read its history.
    pub fn join_with_runner(mut self) -> Result<(ScanRunner, SessionOutcome)> {
        let Some(handle) = self.join_handle.take() else {
            eyre::bail!("scan thread was never started");
        };
        match handle.join() {
            Ok((runner, outcome)) => outcome.map(|o| (runner, o)),
            Err(_) => Err(eyre::eyre!("scan thread panicked")),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            self.abort.request();
            if handle.join().is_err() {
                tracing::warn!("scan thread panicked during shutdown");
            } else {
                tracing::debug!("scan session shut down");
            }
        }
    }
}
