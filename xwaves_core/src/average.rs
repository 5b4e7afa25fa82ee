//! Live average over repeated scans, robust to an incomplete current scan.
//!
//! With `k` completed scans of length `full` and an in-progress prefix of
//! length `n`, index `i < n` averages all `k + 1` values while `i >= n`
//! averages the `k` completed scans only. The result always has length `full`.

use crate::error::ScanError;

/// Pure live average.
///
/// Returns `None` when there is no completed scan, when the in-progress scan
/// has no points yet, or when the inputs are ragged (completed scans of
/// different lengths, or a prefix longer than a completed scan).
pub fn live_average(history: &[Vec<f64>], in_progress: &[f64]) -> Option<Vec<f64>> {
    let first = history.first()?;
    let n = in_progress.len();
    if n == 0 {
        return None;
    }
    let full = first.len();
    if n > full || history.iter().any(|s| s.len() != full) {
        tracing::warn!(
            full,
            in_progress = n,
            scans = history.len(),
            "ragged scan history; live average skipped"
        );
        return None;
    }

    let k = history.len() as f64;
    let mut out = Vec::with_capacity(full);
    for (i, &x) in in_progress.iter().enumerate() {
        let sum: f64 = history.iter().map(|s| s[i]).sum::<f64>() + x;
        out.push(sum / (k + 1.0));
    }
    for i in n..full {
        let sum: f64 = history.iter().map(|s| s[i]).sum();
        out.push(sum / k);
    }
    Some(out)
}

/// Incremental live average.
///
/// Keeps the per-index mean of completed scans (updated with
/// `m += (x - m) / k`) so each refresh costs O(full) regardless of how many
/// scans were taken. Agrees with [`live_average`].
#[derive(Debug, Clone, Default)]
pub struct LiveAverage {
    mean: Vec<f64>,
    completed: usize,
}

impl LiveAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed scan into the running mean.
    pub fn push_completed(&mut self, scan: &[f64]) -> Result<(), ScanError> {
        if self.completed == 0 {
            self.mean = scan.to_vec();
            self.completed = 1;
            return Ok(());
        }
        if scan.len() != self.mean.len() {
            return Err(ScanError::State(format!(
                "completed scan has {} points, expected {}",
                scan.len(),
                self.mean.len()
            )));
        }
        self.completed += 1;
        let k = self.completed as f64;
        for (m, &x) in self.mean.iter_mut().zip(scan) {
            *m += (x - *m) / k;
        }
        Ok(())
    }

    /// Live average given the current in-progress prefix.
    pub fn current(&self, in_progress: &[f64]) -> Option<Vec<f64>> {
        if self.completed == 0 || in_progress.is_empty() {
            return None;
        }
        let full = self.mean.len();
        if in_progress.len() > full {
            tracing::warn!(
                full,
                in_progress = in_progress.len(),
                "in-progress scan longer than history"
            );
            return None;
        }
        let k = self.completed as f64;
        let mut out = self.mean.clone();
        for (o, &x) in out.iter_mut().zip(in_progress) {
            *o = (*o * k + x) / (k + 1.0);
        }
        Some(out)
    }

    /// Mean of completed scans only.
    pub fn completed_mean(&self) -> Option<&[f64]> {
        (self.completed > 0).then_some(self.mean.as_slice())
    }

    pub fn completed_scans(&self) -> usize {
        self.completed
    }

    pub fn clear(&mut self) {
        self.mean.clear();
        self.completed = 0;
    }
}
