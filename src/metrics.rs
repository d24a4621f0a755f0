/// Live metrics for the TUI visualizer.
///
/// Runs and sweeps write a JSON snapshot to METRICS_PATH after every
/// simulated size. The viz binary polls this file and re-renders the
/// dashboard. Writes are atomic (write to .tmp then rename) to avoid torn reads.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::profile::HardwareProfile;
use crate::report::PerfReport;

pub const METRICS_PATH: &str = "/tmp/mosaicsim_live.json";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One simulated size.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct SweepPoint {
    /// Problem label, e.g. "64" for a square sweep or "64x128x32"
    pub label: String,
    pub tflops: f64,
    pub cycles: u64,
    pub compute: u64,
    pub reduce: u64,
    pub exchange: u64,
    pub n_procs: usize,
    pub mem_kb: usize,
}

impl SweepPoint {
    pub fn from_report(label: impl Into<String>, report: &PerfReport) -> Self {
        SweepPoint {
            label: label.into(),
            tflops: report.effective_tflops,
            cycles: report.total_cycles,
            compute: report.compute_cycles,
            reduce: report.reduce_cycles,
            exchange: report.exchange_cycles,
            n_procs: report.active_procs,
            mem_kb: report.active_mem_kb,
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct LiveMetrics {
    /// "idle" | "running" | "complete" | "failed"
    pub status: String,
    pub profile: String,
    pub objective: String,
    pub max_procs: usize,
    pub max_proc_mem_kb: usize,
    pub peak_tflops: f64,
    /// Sizes the current run or sweep will simulate
    pub sizes_total: usize,
    /// Completed points, in simulation order
    pub points: Vec<SweepPoint>,
    /// Error message of a failed run
    #[serde(default)]
    pub error: Option<String>,
    /// Unix timestamp in ms when this snapshot was written
    pub timestamp_ms: u64,
}

impl LiveMetrics {
    /// Fresh "running" snapshot for a run of `sizes_total` sizes on `profile`.
    pub fn running(profile: &HardwareProfile, objective: &str, sizes_total: usize) -> Self {
        LiveMetrics {
            status: "running".to_string(),
            profile: profile.name.clone(),
            objective: objective.to_string(),
            max_procs: profile.max_procs,
            max_proc_mem_kb: profile.max_proc_mem_kb,
            peak_tflops: profile.peak_tflops(),
            sizes_total,
            points: Vec::new(),
            error: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn latest(&self) -> Option<&SweepPoint> {
        self.points.last()
    }
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

/// Atomically write metrics to METRICS_PATH.
pub fn write_metrics(metrics: &LiveMetrics) {
    write_metrics_to(METRICS_PATH, metrics);
}

/// Atomically write metrics to `path` (.tmp intermediate + rename).
/// Failures are logged and otherwise ignored; the dashboard is best-effort.
pub fn write_metrics_to(path: impl AsRef<Path>, metrics: &LiveMetrics) {
    let path = path.as_ref();
    let json = match serde_json::to_string(metrics) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("could not serialize live metrics: {}", e);
            return;
        }
    };
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&tmp, &json).and_then(|_| std::fs::rename(&tmp, path)) {
        log::debug!("could not write live metrics to {}: {}", path.display(), e);
    }
}

/// Read the latest metrics snapshot. Returns None if the file doesn't exist
/// or can't be parsed (e.g. no simulation has run yet).
pub fn read_metrics() -> Option<LiveMetrics> {
    read_metrics_from(METRICS_PATH)
}

pub fn read_metrics_from(path: impl AsRef<Path>) -> Option<LiveMetrics> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Returns current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_the_file_round_trip() {
        let path = std::env::temp_dir().join(format!("mosaicsim_metrics_test_{}.json", std::process::id()));
        let metrics = LiveMetrics {
            status: "running".to_string(),
            profile: "v100".to_string(),
            sizes_total: 3,
            points: vec![SweepPoint { label: "64".to_string(), cycles: 1148, ..Default::default() }],
            timestamp_ms: now_ms(),
            ..Default::default()
        };
        write_metrics_to(&path, &metrics);
        let back = read_metrics_from(&path).unwrap();
        assert_eq!(back.status, "running");
        assert_eq!(back.latest().map(|p| p.cycles), Some(1148));
        assert!(!path.with_extension("json.tmp").exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_snapshot_reads_as_none() {
        assert!(read_metrics_from("/nonexistent/mosaicsim.json").is_none());
    }
}
