/// Tasklist vocabulary.
///
/// A workload is an ordered sequence of operation records produced by an
/// external trace or static-analysis tool. Records are immutable and
/// consumed once by a cost interpreter; the serialized tags follow the
/// vocabulary those tools emit.
use serde::{Deserialize, Serialize};

/// Access target for records that bypass the hit-rate model. Levels past
/// L2 and plain RAM all price at main-memory latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemLevel {
    L1,
    L2,
    L3,
    L4,
    L5,
    #[serde(rename = "RAM", alias = "mem")]
    Ram,
}

/// One modeled GPU kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelCall {
    pub blocks: u32,
    pub threads_per_block: u32,
    /// Floating-point work per thread
    pub flops_per_thread: f64,
    /// Device memory traffic per thread in bytes
    pub bytes_per_thread: f64,
}

/// One operation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Generic CPU ops
    #[serde(rename = "CPU")]
    Cpu(f64),
    /// Integer ALU ops
    #[serde(rename = "iALU")]
    Ialu(f64),
    /// Floating-point ALU ops
    #[serde(rename = "fALU")]
    Falu(f64),
    /// Floating-point divisions
    #[serde(rename = "fDIV")]
    Fdiv(f64),
    /// Integer vector ops at a requested width in bytes
    #[serde(rename = "INTVEC")]
    IntVec { ops: f64, width: u32 },
    /// Floating-point vector ops at a requested width in bytes
    #[serde(rename = "VECTOR")]
    Vector { ops: f64, width: u32 },
    /// Accesses charged directly at one level when the caller already knows
    /// the access mix
    #[serde(rename = "ACCESS")]
    Access { level: MemLevel, count: f64 },
    /// Summarized loads with reuse-distance statistics; per-level hit rates
    /// come from the Gaussian estimator
    #[serde(rename = "MEM_ACCESS")]
    MemAccess {
        index_vars: f64,
        float_vars: f64,
        /// Mean distance between consecutive accesses, in bytes
        avg_dist: f64,
        avg_reuse_dist: f64,
        stdev_reuse_dist: f64,
        index_loads: f64,
        float_loads: f64,
        /// First touch by a new call: the float working set pages in from
        /// main memory before any cache traffic
        new_call: bool,
    },
    /// Summarized loads with per-level hit rates measured externally,
    /// innermost level first
    #[serde(rename = "HITRATES")]
    HitRates {
        rates: [f64; 3],
        index_vars: f64,
        float_vars: f64,
        avg_dist: f64,
        index_loads: f64,
        float_loads: f64,
        new_call: bool,
    },
    /// Stack-distance histogram for the binomial hit-rate model
    #[serde(rename = "MEM_DIST")]
    MemAccessDist {
        distances: Vec<f64>,
        probabilities: Vec<f64>,
        /// Consecutive accesses amortized per latency charge
        block_size: f64,
        total_bytes: f64,
    },
    /// Message to another node, charged as time rather than cycles
    #[serde(rename = "internode")]
    InterNode { bytes: f64 },
    /// Traffic between cores of one node, charged as paged RAM accesses
    #[serde(rename = "intranode")]
    IntraNode { bytes: f64 },
    /// Grow the modeled memory footprint
    #[serde(rename = "alloc")]
    Alloc { bytes: f64 },
    /// Shrink the modeled memory footprint; never charged
    #[serde(rename = "unalloc")]
    Unalloc { bytes: f64 },
    /// Reserve device memory on an accelerator
    #[serde(rename = "DEVICE_ALLOC")]
    DeviceAlloc { device: usize, bytes: f64 },
    /// Move data to an accelerator over the host link
    #[serde(rename = "DEVICE_TRANSFER")]
    DeviceTransfer { device: usize, bytes: f64 },
    /// Launch a kernel; the host keeps running until a sync
    #[serde(rename = "KERNEL_CALL")]
    KernelCall { device: usize, call: KernelCall },
    /// Block until the accelerator's outstanding work completes
    #[serde(rename = "DEVICE_SYNC")]
    DeviceSync { device: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_accepts_mem_alias() {
        let level: MemLevel = serde_json::from_str("\"mem\"").unwrap();
        assert_eq!(level, MemLevel::Ram);
        let level: MemLevel = serde_json::from_str("\"RAM\"").unwrap();
        assert_eq!(level, MemLevel::Ram);
    }

    #[test]
    fn ops_serialize_with_domain_tags() {
        let json = serde_json::to_string(&Op::Ialu(50.0)).unwrap();
        assert_eq!(json, r#"{"iALU":50.0}"#);
        let json = serde_json::to_string(&Op::DeviceSync { device: 0 }).unwrap();
        assert_eq!(json, r#"{"DEVICE_SYNC":{"device":0}}"#);
    }
}
