/// Live prediction report for the TUI dashboard.
///
/// The predictor writes a JSON snapshot to REPORT_PATH after every tasklist
/// it prices. The viz binary polls this file and re-renders the dashboard.
/// Writes are atomic (write to .tmp then rename) to avoid torn reads.
use serde::{Deserialize, Serialize};

use crate::cost::Stats;

pub const REPORT_PATH: &str = "/tmp/cpusim_live.json";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Snapshot of one task-graph replay through the pipeline engine.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct GraphSnapshot {
    /// Graph name from the workload
    pub name: String,
    /// Vertex count
    pub vertices: usize,
    /// Simulated completion time in seconds
    pub total_time_s: f64,
    /// Instruction class names and how many vertices carry each
    pub class_mix: Vec<(String, usize)>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct LiveReport {
    /// "idle" | "running" | "complete"
    pub status: String,
    /// Machine preset name
    pub machine: String,
    /// Core clock in Hz
    pub clockspeed: f64,
    /// Workload label
    pub workload: String,
    /// Records in the tasklist just priced
    pub tasklist_len: usize,
    /// Predicted wall time in seconds
    pub predicted_time_s: f64,
    /// Cycles accumulated over the tasklist
    pub cycles: f64,
    /// Thread efficiency applied to the cycle conversion [0.0, 1.0]
    pub thread_efficiency: f64,
    /// Named counters from the memory model
    pub stats: Stats,
    /// Unix timestamp in ms when this snapshot was written
    pub timestamp_ms: u64,

    /// Most recent task-graph replay (if any)
    #[serde(default)]
    pub last_graph: Option<GraphSnapshot>,
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

/// Atomically write the report to REPORT_PATH.
/// Uses a .tmp intermediate file + rename to avoid torn reads by the viz.
pub fn write_report(report: &LiveReport) {
    if let Ok(json) = serde_json::to_string(report) {
        let tmp = format!("{}.tmp", REPORT_PATH);
        if std::fs::write(&tmp, &json).is_ok() {
            let _ = std::fs::rename(&tmp, REPORT_PATH);
        }
    }
}

/// Read the latest report snapshot. Returns None if the file doesn't exist
/// or can't be parsed (e.g. no prediction has run yet).
pub fn read_report() -> Option<LiveReport> {
    let data = std::fs::read_to_string(REPORT_PATH).ok()?;
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
