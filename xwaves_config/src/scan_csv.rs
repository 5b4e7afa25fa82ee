//! Per-scan CSV export schema.
//!
//! Expected headers:
//! time_ps,time_error_ps,actual_time_ps,signal_vrms,signal_error_vrms,live_average_vrms
//!
//! Lines starting with `#` are comments (the exporter writes one with the
//! acquisition settings). Error and average columns may be empty.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCAN_CSV_HEADERS: [&str; 6] = [
    "time_ps",
    "time_error_ps",
    "actual_time_ps",
    "signal_vrms",
    "signal_error_vrms",
    "live_average_vrms",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub time_ps: f64,
    pub time_error_ps: f64,
    pub actual_time_ps: f64,
    pub signal_vrms: f64,
    pub signal_error_vrms: Option<f64>,
    pub live_average_vrms: Option<f64>,
}

/// Render rows as CSV, preceded by a single `# ` comment line.
pub fn scan_csv_bytes(comment: &str, rows: &[ScanRow]) -> eyre::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(b"# ");
    out.extend_from_slice(comment.replace('\n', " ").as_bytes());
    out.push(b'\n');

    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(out);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("serialize scan row: {e}"))?;
    }
    if rows.is_empty() {
        wtr.write_record(SCAN_CSV_HEADERS)
            .map_err(|e| eyre::eyre!("write scan CSV headers: {e}"))?;
    }
    wtr.into_inner()
        .map_err(|e| eyre::eyre!("flush scan CSV: {}", e.error()))
}

pub fn load_scan_csv(path: &Path) -> eyre::Result<Vec<ScanRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(|e| eyre::eyre!("open scan CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != SCAN_CSV_HEADERS {
        eyre::bail!(
            "scan CSV must have headers '{}', got: {}",
            SCAN_CSV_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ScanRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(rows)
}
