//! Test and helper archives for xwaves_core

use std::sync::{Arc, Mutex};

use crate::archive::ScanArchive;
use crate::error::Result;
use crate::packet::ScanArtifact;

/// Archive that discards everything; for dry runs.
pub struct NullArchive;

impl ScanArchive for NullArchive {
    fn persist(&mut self, _artifact: &ScanArtifact) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Stored {
    scans: Vec<ScanArtifact>,
    final_average: Option<Vec<f64>>,
    finished: bool,
}

/// Archive that keeps artifacts in memory. Clones share storage, so a test
/// can keep one handle while the runner owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    inner: Arc<Mutex<Stored>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scans(&self) -> Vec<ScanArtifact> {
        self.inner.lock().map(|s| s.scans.clone()).unwrap_or_default()
    }

    pub fn final_average(&self) -> Option<Vec<f64>> {
        self.inner.lock().ok().and_then(|s| s.final_average.clone())
    }

    pub fn finished(&self) -> bool {
        self.inner.lock().map(|s| s.finished).unwrap_or(false)
    }
}

impl ScanArchive for MemoryArchive {
    fn persist(&mut self, artifact: &ScanArtifact) -> Result<()> {
        if let Ok(mut s) = self.inner.lock() {
            s.scans.push(artifact.clone());
        }
        Ok(())
    }

    fn finish(&mut self, _positions: &[f64], average: Option<&[f64]>) -> Result<()> {
        if let Ok(mut s) = self.inner.lock() {
            s.final_average = average.map(<[f64]>::to_vec);
            s.finished = true;
        }
        Ok(())
    }
}
