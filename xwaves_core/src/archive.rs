//! Persistence of finished scans.
//!
//! `CsvArchive` lays an experiment out as
//! `<root>/<experiment_name>/<HHh_MMmin_DDd_MMm_YYYYy>/<experiment_name>_scan<k>.csv`
//! plus `<experiment_name>_average.csv` once the session ends. Existing
//! experiment directories and files are never overwritten.

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use xwaves_config::{ScanRow, scan_csv_bytes};

use crate::atomic::write_atomic_new;
use crate::config::ExperimentParameters;
use crate::error::{Result, ScanError};
use crate::packet::ScanArtifact;

/// Sink for finished scans. Called from the scan thread.
pub trait ScanArchive {
    fn persist(&mut self, artifact: &ScanArtifact) -> Result<()>;

    /// Session finished (completed or aborted) with the mean of all completed scans.
    fn finish(&mut self, _positions: &[f64], _average: Option<&[f64]>) -> Result<()> {
        Ok(())
    }
}

impl<T: ScanArchive + ?Sized> ScanArchive for Box<T> {
    fn persist(&mut self, artifact: &ScanArtifact) -> Result<()> {
        (**self).persist(artifact)
    }
    fn finish(&mut self, positions: &[f64], average: Option<&[f64]>) -> Result<()> {
        (**self).finish(positions, average)
    }
}

fn io_report(e: &std::io::Error) -> eyre::Report {
    eyre::Report::new(ScanError::Io(e.to_string()))
}

pub struct CsvArchive {
    dir: PathBuf,
    stem: String,
    comment: String,
    time_zero_ps: f64,
    time_error_ps: f64,
    written: Vec<PathBuf>,
}

impl CsvArchive {
    /// Create the experiment directory under `root`. Fails if it already exists.
    pub fn create(
        root: &Path,
        params: &ExperimentParameters,
        time_error_ps: f64,
    ) -> Result<Self> {
        let now = chrono::Local::now();
        let experiment_dir = root.join(&params.experiment_name);
        std::fs::create_dir_all(&experiment_dir)
            .map_err(|e| io_report(&e))
            .wrap_err_with(|| format!("creating {}", experiment_dir.display()))?;

        let dir = experiment_dir.join(now.format("%Hh_%Mmin_%dd_%mm_%Yy").to_string());
        std::fs::create_dir(&dir)
            .map_err(|e| io_report(&e))
            .wrap_err_with(|| format!("experiment output {} already in use", dir.display()))?;

        let comment = format!(
            "Date: {}, time constant: {} s, filter slope: {}, time zero: {} ps, scans: {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            params.time_constant_s,
            params.filter_slope,
            params.time_zero_ps,
            params.num_scans
        );
        tracing::info!(dir = %dir.display(), "experiment directory created");

        Ok(Self {
            dir,
            stem: params.experiment_name.clone(),
            comment,
            time_zero_ps: params.time_zero_ps,
            time_error_ps,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Path of the CSV for a 0-based scan index (files are numbered from 1).
    pub fn scan_path(&self, scan_index: u32) -> PathBuf {
        self.dir
            .join(format!("{}_scan{}.csv", self.stem, scan_index + 1))
    }

    fn write(&mut self, path: PathBuf, rows: &[ScanRow]) -> Result<()> {
        let bytes = scan_csv_bytes(&self.comment, rows)?;
        write_atomic_new(&path, &bytes)
            .map_err(|e| io_report(&e))
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "scan persisted");
        self.written.push(path);
        Ok(())
    }
}

impl ScanArchive for CsvArchive {
    fn persist(&mut self, a: &ScanArtifact) -> Result<()> {
        let rows: Vec<ScanRow> = (0..a.positions.len())
            .map(|i| ScanRow {
                time_ps: a.positions[i] - self.time_zero_ps,
                time_error_ps: self.time_error_ps,
                actual_time_ps: a.actual_positions.get(i).copied().unwrap_or(f64::NAN)
                    - self.time_zero_ps,
                signal_vrms: a.magnitudes.get(i).copied().unwrap_or(f64::NAN),
                signal_error_vrms: a.errors.as_ref().and_then(|e| e.get(i).copied()),
                live_average_vrms: a.live_average.as_ref().and_then(|v| v.get(i).copied()),
            })
            .collect();
        let path = self.scan_path(a.scan_index);
        self.write(path, &rows)
    }

    fn finish(&mut self, positions: &[f64], average: Option<&[f64]>) -> Result<()> {
        let Some(avg) = average else {
            return Ok(());
        };
        let rows: Vec<ScanRow> = positions
            .iter()
            .zip(avg)
            .map(|(&p, &v)| ScanRow {
                time_ps: p - self.time_zero_ps,
                time_error_ps: self.time_error_ps,
                actual_time_ps: p - self.time_zero_ps,
                signal_vrms: v,
                signal_error_vrms: None,
                live_average_vrms: Some(v),
            })
            .collect();
        let path = self.dir.join(format!("{}_average.csv", self.stem));
        self.write(path, &rows)
    }
}
