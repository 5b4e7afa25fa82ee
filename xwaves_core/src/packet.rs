//! Data flowing out of the scan thread.

/// Wall time spent in each phase of one step, seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepTiming {
    pub move_s: f64,
    pub settle_s: f64,
    pub measure_s: f64,
}

impl StepTiming {
    pub fn total_s(&self) -> f64 {
        self.move_s + self.settle_s + self.measure_s
    }
}

/// Emitted after every measured point.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    pub scan_index: u32,
    pub step_index: usize,
    pub total_steps: usize,
    pub position_ps: f64,
    pub actual_position_ps: f64,
    pub magnitude: f64,
    pub error: Option<f64>,
    pub live_average: Option<Vec<f64>>,
    pub timing: StepTiming,
}

/// One finished scan, as published and archived.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanArtifact {
    pub scan_index: u32,
    pub positions: Vec<f64>,
    pub actual_positions: Vec<f64>,
    pub magnitudes: Vec<f64>,
    pub errors: Option<Vec<f64>>,
    pub live_average: Option<Vec<f64>>,
}

/// Everything the monitor receives, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Step(DataPacket),
    ScanFinished(ScanArtifact),
}
