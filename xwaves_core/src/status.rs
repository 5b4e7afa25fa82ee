//! Scan state machine states and per-step outcomes.

use crate::packet::ScanArtifact;

/// Where the runner currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Preparing,
    Moving,
    Settling,
    Autoranging,
    Measuring,
    MeasuringError,
    Publishing,
    Completed,
    Aborted,
    Failed,
}

impl ScanState {
    /// Nothing more will happen until `begin` is called again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

/// Public status of a single step of the scan loop.
#[derive(Debug)]
pub enum StepStatus {
    /// Point measured; more positions remain.
    Running,
    /// Last point measured and the scan published.
    ScanComplete(ScanArtifact),
    /// Abort observed before this step; the in-progress scan was discarded.
    Aborted { scan_index: u32, step_index: usize },
}
