/// Node collaborators.
///
/// The cost interpreter charges memory management, inter-node messages and
/// accelerator work against the node it runs on. Memory and accelerators are
/// small capability traits so a workload can run against the bundled models
/// here or against richer ones supplied by the caller; the interconnect is a
/// plain bandwidth/latency pair.
use log::warn;
use std::fmt;

use crate::machine::GB;
use crate::task::KernelCall;

/// Modeled main-memory footprint of a node.
pub trait MemoryAllocator: fmt::Debug {
    /// Apply a signed byte delta; positive allocates, negative frees.
    /// Returns whether capacity was available for the request.
    fn mem_alloc(&mut self, delta: f64) -> bool;
    /// Bytes currently allocated.
    fn in_use_bytes(&self) -> f64;
}

/// Attached compute device (GPU or similar offload target).
pub trait Accelerator: fmt::Debug {
    /// Apply a signed byte delta to the device memory footprint.
    fn allocate_device_mem(&mut self, bytes: f64);
    /// Seconds to move `bytes` over the host link.
    fn transfer_to_device(&self, bytes: f64) -> f64;
    /// Seconds the device stays busy with one kernel launch. `start` is the
    /// absolute simulated time of the launch, for models that care about it.
    fn kernel_call(&self, call: &KernelCall, start: f64) -> f64;
}

// ---------------------------------------------------------------------------
// Bundled models
// ---------------------------------------------------------------------------

/// Fixed-capacity allocator; frees clamp at an empty pool.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    capacity: f64,
    in_use: f64,
}

impl MemoryPool {
    pub fn new(capacity: f64) -> MemoryPool {
        MemoryPool { capacity, in_use: 0.0 }
    }
}

impl MemoryAllocator for MemoryPool {
    fn mem_alloc(&mut self, delta: f64) -> bool {
        if delta >= 0.0 {
            if self.in_use + delta > self.capacity {
                return false;
            }
            self.in_use += delta;
        } else {
            self.in_use = (self.in_use + delta).max(0.0);
        }
        true
    }

    fn in_use_bytes(&self) -> f64 {
        self.in_use
    }
}

/// Bandwidth/latency pair for one interconnect generation.
#[derive(Debug, Clone)]
pub struct InterconnectConfig {
    pub bandwidth: f64,
    pub latency: f64,
}

impl InterconnectConfig {
    /// Cray Gemini (XE6 class), sustained MPI point-to-point.
    pub fn gemini() -> Self {
        InterconnectConfig { bandwidth: 4.7e9, latency: 1.4e-6 }
    }

    /// Cray Aries (XC30 class).
    pub fn aries() -> Self {
        InterconnectConfig { bandwidth: 8.0e9, latency: 1.3e-6 }
    }

    /// FDR InfiniBand.
    pub fn infiniband() -> Self {
        InterconnectConfig { bandwidth: 6.8e9, latency: 1.0e-6 }
    }

    /// Seconds to deliver one message.
    pub fn transfer_time(&self, bytes: f64) -> f64 {
        bytes / self.bandwidth + self.latency
    }
}

/// Roofline device model: a kernel runs at the slower of its compute and
/// memory ceilings, plus a fixed launch overhead.
#[derive(Debug, Clone)]
pub struct DeviceModel {
    pub name: &'static str,
    /// Peak double-precision throughput in FLOP/s
    pub peak_flops: f64,
    /// Device memory bandwidth in bytes per second
    pub mem_bandwidth: f64,
    /// Device memory capacity in bytes
    pub mem_capacity: f64,
    /// Host link bandwidth in bytes per second
    pub link_bandwidth: f64,
    /// Host link latency in seconds
    pub link_latency: f64,
    /// Fixed kernel launch cost in seconds
    pub launch_overhead: f64,
    mem_in_use: f64,
}

impl DeviceModel {
    /// Tesla M2090 (Fermi) on a PCIe 2.0 x16 link.
    pub fn m2090() -> Self {
        DeviceModel {
            name: "m2090",
            peak_flops: 665.6e9,
            mem_bandwidth: 177.6e9,
            mem_capacity: 6.0 * GB,
            link_bandwidth: 5.2e9,
            link_latency: 10.0e-6,
            launch_overhead: 7.0e-6,
            mem_in_use: 0.0,
        }
    }

    /// Tesla K20X (Kepler) on a PCIe 2.0 x16 link.
    pub fn k20x() -> Self {
        DeviceModel {
            name: "k20x",
            peak_flops: 1.31e12,
            mem_bandwidth: 250.0e9,
            mem_capacity: 6.0 * GB,
            link_bandwidth: 5.2e9,
            link_latency: 10.0e-6,
            launch_overhead: 5.0e-6,
            mem_in_use: 0.0,
        }
    }

    pub fn mem_in_use(&self) -> f64 {
        self.mem_in_use
    }
}

impl Accelerator for DeviceModel {
    fn allocate_device_mem(&mut self, bytes: f64) {
        self.mem_in_use = (self.mem_in_use + bytes).max(0.0);
        if self.mem_in_use > self.mem_capacity {
            warn!(
                "{}: device memory oversubscribed, {:.0} of {:.0} bytes",
                self.name, self.mem_in_use, self.mem_capacity
            );
        }
    }

    fn transfer_to_device(&self, bytes: f64) -> f64 {
        self.link_latency + bytes / self.link_bandwidth
    }

    fn kernel_call(&self, call: &KernelCall, _start: f64) -> f64 {
        let threads = f64::from(call.blocks) * f64::from(call.threads_per_block);
        let compute = threads * call.flops_per_thread / self.peak_flops;
        let traffic = threads * call.bytes_per_thread / self.mem_bandwidth;
        self.launch_overhead + compute.max(traffic)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One compute node: main memory, its outward link, and attached devices.
#[derive(Debug)]
pub struct Node {
    pub memory: Box<dyn MemoryAllocator>,
    pub interconnect: InterconnectConfig,
    /// Fallback access cost when an allocation spills past main memory
    pub filesystem_access_time: f64,
    pub accelerators: Vec<Box<dyn Accelerator>>,
}

impl Node {
    pub fn new(mem_capacity: f64) -> Node {
        Node {
            memory: Box::new(MemoryPool::new(mem_capacity)),
            interconnect: InterconnectConfig::gemini(),
            filesystem_access_time: 1.0e-4,
            accelerators: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_tracks_footprint() {
        let mut pool = MemoryPool::new(1000.0);
        assert!(pool.mem_alloc(800.0));
        assert!(!pool.mem_alloc(300.0));
        // The rejected request leaves the footprint untouched.
        assert!((pool.in_use_bytes() - 800.0).abs() < 1e-12);
        assert!(pool.mem_alloc(-500.0));
        assert!((pool.in_use_bytes() - 300.0).abs() < 1e-12);
    }

    #[test]
    fn pool_free_clamps_at_empty() {
        let mut pool = MemoryPool::new(1000.0);
        assert!(pool.mem_alloc(-50.0));
        assert_eq!(pool.in_use_bytes(), 0.0);
    }

    #[test]
    fn message_time_includes_latency() {
        let link = InterconnectConfig::gemini();
        let t = link.transfer_time(4.7e9);
        assert!((t - (1.0 + 1.4e-6)).abs() < 1e-9);
    }

    #[test]
    fn device_transfer_scales_with_bytes() {
        let dev = DeviceModel::m2090();
        let small = dev.transfer_to_device(0.0);
        let big = dev.transfer_to_device(5.2e9);
        assert!((small - 10.0e-6).abs() < 1e-12);
        assert!((big - small - 1.0).abs() < 1e-9);
    }

    #[test]
    fn kernel_time_takes_the_slower_ceiling() {
        let dev = DeviceModel::m2090();
        let compute_bound = KernelCall {
            blocks: 1024,
            threads_per_block: 256,
            flops_per_thread: 1.0e6,
            bytes_per_thread: 8.0,
        };
        let memory_bound = KernelCall {
            blocks: 1024,
            threads_per_block: 256,
            flops_per_thread: 1.0,
            bytes_per_thread: 1.0e6,
        };
        let threads = 1024.0 * 256.0;
        let tc = dev.kernel_call(&compute_bound, 0.0);
        let tm = dev.kernel_call(&memory_bound, 0.0);
        assert!((tc - (dev.launch_overhead + threads * 1.0e6 / dev.peak_flops)).abs() < 1e-9);
        assert!((tm - (dev.launch_overhead + threads * 1.0e6 / dev.mem_bandwidth)).abs() < 1e-9);
    }

    #[test]
    fn device_memory_clamps_on_free() {
        let mut dev = DeviceModel::k20x();
        dev.allocate_device_mem(1.0 * GB);
        dev.allocate_device_mem(-2.0 * GB);
        assert_eq!(dev.mem_in_use(), 0.0);
    }
}
