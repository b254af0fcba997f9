/// Workload cost interpreters.
///
/// `ProcessorCore` walks a tasklist once and folds every record into an
/// accumulated cycle count, a wall-clock time and a statistics map. Two
/// interpreters share the accumulators but price memory differently:
/// `time_compute` chains summarized loads through the cache hierarchy with
/// the Gaussian reuse-distance estimator, `time_compute_amm` prices whole
/// stack-distance histograms with the binomial model. Records a given
/// interpreter does not price are logged and skipped, never fatal.
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::{PipelineEngine, SimError};
use crate::graph::{GraphTiming, TaskGraph};
use crate::hitrate;
use crate::machine::MachineConfig;
use crate::node::Node;
use crate::task::{MemLevel, Op};

/// Keys reported by `time_compute`, present even when zero.
const REUSE_STAT_KEYS: &[&str] = &[
    "L1_float_hits",
    "L2_float_hits",
    "L1_int_hits",
    "L2_int_hits",
    "L1_int_misses",
    "L2_int_misses",
    "L1_float_misses",
    "L2_float_misses",
    "RAM accesses",
    "L1 cycles",
    "L2 cycles",
    "RAM cycles",
    "CPU cycles",
    "iALU cycles",
    "fALU cycles",
    "fDIV cycles",
    "INTVEC ops",
    "INTVEC cycles",
    "VECTOR ops",
    "VECTOR cycles",
    "internode comm time",
    "intranode comm time",
];

/// Keys reported by `time_compute_amm`.
const DIST_STAT_KEYS: &[&str] = &[
    "L1_hit_rate",
    "L2_hit_rate",
    "L3_hit_rate",
    "Effective Latency",
    "Effective Throughput",
    "RAM cycles",
    "CPU cycles",
    "iALU cycles",
    "fALU cycles",
    "fDIV cycles",
    "T_eff_cycles",
];

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Named per-category counters accumulated during a cost computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats(BTreeMap<String, f64>);

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    fn with_keys(keys: &[&str]) -> Stats {
        Stats(keys.iter().map(|k| ((*k).to_string(), 0.0)).collect())
    }

    pub fn add(&mut self, key: &str, delta: f64) {
        *self.0.entry(key.to_string()).or_insert(0.0) += delta;
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    /// Value for `key`, zero when the key was never touched.
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of interpreting one tasklist.
#[derive(Debug, Clone)]
pub struct CostResult {
    /// Predicted wall-clock seconds
    pub time: f64,
    /// Accumulated core cycles
    pub cycles: f64,
    pub stats: Stats,
}

/// Load population of one summarized memory record.
struct LoadProfile {
    index_vars: f64,
    float_vars: f64,
    avg_dist: f64,
    index_loads: f64,
    float_loads: f64,
    new_call: bool,
}

/// Hits and misses of one cache level while chaining a load population.
struct LevelTraffic {
    int_hits: f64,
    float_hits: f64,
    int_misses: f64,
    float_misses: f64,
}

// ---------------------------------------------------------------------------
// Processor core
// ---------------------------------------------------------------------------

/// One modeled core executing tasklists against a machine preset and the
/// node it lives on.
#[derive(Debug)]
pub struct ProcessorCore<'n> {
    pub machine: MachineConfig,
    node: &'n mut Node,
    /// Software threads currently scheduled on this core's node
    pub active_threads: u32,
    /// Cycle stamp at which each accelerator finishes its outstanding work
    end_device: Vec<f64>,
}

impl<'n> ProcessorCore<'n> {
    pub fn new(machine: MachineConfig, node: &'n mut Node) -> ProcessorCore<'n> {
        let end_device = vec![0.0; node.accelerators.len()];
        ProcessorCore { machine, node, active_threads: 1, end_device }
    }

    /// Derating factor once software threads oversubscribe the hardware.
    pub fn thread_efficiency(&self) -> f64 {
        if self.active_threads <= self.machine.hwthreads {
            1.0
        } else {
            f64::from(self.machine.hwthreads) / f64::from(self.active_threads)
        }
    }

    /// Price a tasklist with the Gaussian reuse-distance memory model.
    /// `start` is the absolute simulated time of the first record; kernel
    /// launches pass it through to the device model.
    pub fn time_compute(&mut self, tasklist: &[Op], start: f64) -> CostResult {
        let mut cycles = 0.0;
        let mut time = 0.0;
        let mut stats = Stats::with_keys(REUSE_STAT_KEYS);

        for op in tasklist {
            match op {
                Op::MemAccess {
                    index_vars,
                    float_vars,
                    avg_dist,
                    avg_reuse_dist,
                    stdev_reuse_dist,
                    index_loads,
                    float_loads,
                    new_call,
                } => {
                    let rates: Vec<f64> = self
                        .machine
                        .cache
                        .iter()
                        .map(|lvl| hitrate::reuse_hit_rate(lvl, *avg_reuse_dist, *stdev_reuse_dist))
                        .collect();
                    let profile = LoadProfile {
                        index_vars: *index_vars,
                        float_vars: *float_vars,
                        avg_dist: *avg_dist,
                        index_loads: *index_loads,
                        float_loads: *float_loads,
                        new_call: *new_call,
                    };
                    cycles += self.charge_memory_chain(&rates, &profile, &mut stats);
                }
                Op::HitRates {
                    rates,
                    index_vars,
                    float_vars,
                    avg_dist,
                    index_loads,
                    float_loads,
                    new_call,
                } => {
                    let profile = LoadProfile {
                        index_vars: *index_vars,
                        float_vars: *float_vars,
                        avg_dist: *avg_dist,
                        index_loads: *index_loads,
                        float_loads: *float_loads,
                        new_call: *new_call,
                    };
                    cycles += self.charge_memory_chain(rates, &profile, &mut stats);
                }
                Op::Access { level, count } => {
                    cycles += count * self.level_cycles(*level);
                }
                Op::Cpu(ops) => {
                    let c = ops * self.machine.cycles_per_cpu_op;
                    cycles += c;
                    stats.add("CPU cycles", c);
                }
                Op::Ialu(ops) => {
                    let c = ops * self.machine.cycles_per_ialu;
                    cycles += c;
                    stats.add("iALU cycles", c);
                }
                Op::Falu(ops) => {
                    let c = ops * self.machine.cycles_per_falu;
                    cycles += c;
                    stats.add("fALU cycles", c);
                }
                Op::Fdiv(ops) => {
                    let c = ops * self.machine.cycles_per_division;
                    cycles += c;
                    stats.add("fDIV cycles", c);
                }
                Op::IntVec { ops, width } => {
                    // A request wider than the vector unit costs one extra
                    // pass per full multiple of the native width.
                    let passes = f64::from(1 + width / self.machine.vector_width);
                    let vec_ops = passes * ops;
                    cycles += vec_ops * self.machine.cycles_per_int_vec;
                    stats.add("INTVEC ops", vec_ops);
                    stats.add("INTVEC cycles", vec_ops * self.machine.cycles_per_int_vec);
                }
                Op::Vector { ops, width } => {
                    let passes = f64::from(1 + width / self.machine.vector_width);
                    let vec_ops = passes * ops;
                    cycles += vec_ops * self.machine.cycles_per_vector_op;
                    stats.add("VECTOR ops", vec_ops);
                    stats.add("VECTOR cycles", vec_ops * self.machine.cycles_per_vector_op);
                }
                Op::InterNode { bytes } => {
                    // Messages leave the core; charged as time, not cycles.
                    let t = self.node.interconnect.transfer_time(*bytes);
                    time += t;
                    stats.add("internode comm time", t);
                }
                Op::IntraNode { bytes } => {
                    let c = bytes / self.machine.ram_page_size * self.machine.ram_cycles();
                    cycles += c;
                    stats.add("intranode comm time", c);
                }
                Op::Alloc { bytes } => {
                    if self.node.memory.mem_alloc(bytes.abs()) {
                        // One RAM access worth of bookkeeping.
                        cycles += self.machine.ram_cycles();
                    } else {
                        // Spills past main memory; modeled as filesystem traffic.
                        time += self.node.filesystem_access_time;
                    }
                }
                Op::Unalloc { bytes } => {
                    self.node.memory.mem_alloc(-bytes.abs());
                }
                Op::DeviceAlloc { device, bytes } => {
                    if self.check_device(*device) {
                        self.node.accelerators[*device].allocate_device_mem(*bytes);
                    }
                }
                Op::DeviceTransfer { device, bytes } => {
                    if self.check_device(*device) {
                        let clock = self.machine.clockspeed;
                        cycles += self.node.accelerators[*device].transfer_to_device(*bytes) * clock;
                    }
                }
                Op::KernelCall { device, call } => {
                    if self.check_device(*device) {
                        let clock = self.machine.clockspeed;
                        let busy =
                            self.node.accelerators[*device].kernel_call(call, start + cycles / clock);
                        // The host keeps running; remember when the device
                        // frees up so a later sync can stall to it.
                        self.end_device[*device] =
                            self.end_device[*device].max(cycles + busy * clock);
                    }
                }
                Op::DeviceSync { device } => {
                    if self.check_device(*device) {
                        cycles = cycles.max(self.end_device[*device]);
                    }
                }
                Op::MemAccessDist { .. } => {
                    warn!("stack-distance record not priced by the reuse-distance interpreter, skipping");
                }
            }
        }

        time += cycles / self.machine.clockspeed * self.thread_efficiency();
        stats.set("Thread Efficiency", self.thread_efficiency());
        CostResult { time, cycles, stats }
    }

    /// Price a tasklist with the stack-distance binomial memory model.
    pub fn time_compute_amm(&mut self, tasklist: &[Op]) -> CostResult {
        let mut cycles = 0.0;
        let mut time = 0.0;
        let mut stats = Stats::with_keys(DIST_STAT_KEYS);

        for op in tasklist {
            match op {
                Op::MemAccessDist { distances, probabilities, block_size, total_bytes } => {
                    let rates = self.distribution_rates(distances, probabilities);
                    let (l_eff, b_eff) = self.effective_access_cycles(&rates);
                    // The first access in a block pays latency, the rest
                    // stream at the bandwidth cost.
                    let per_access = (l_eff + (block_size - 1.0) * b_eff) / block_size;
                    cycles += per_access * total_bytes / 8.0;

                    for (i, r) in rates.iter().enumerate().take(3) {
                        stats.add(&format!("L{}_hit_rate", i + 1), *r);
                    }
                    stats.add("Effective Latency", l_eff);
                    stats.add("Effective Throughput", b_eff);
                    stats.add("T_eff_cycles", cycles);
                }
                Op::Cpu(ops) => {
                    let c = ops * self.machine.cycles_per_cpu_op;
                    cycles += c;
                    stats.add("CPU cycles", c);
                }
                Op::Ialu(ops) => {
                    let c = ops * self.machine.cycles_per_ialu;
                    cycles += c;
                    stats.add("iALU cycles", c);
                }
                Op::Falu(ops) => {
                    let c = ops * self.machine.cycles_per_falu;
                    cycles += c;
                    stats.add("fALU cycles", c);
                }
                Op::Fdiv(ops) => {
                    let c = ops * self.machine.cycles_per_division;
                    cycles += c;
                    stats.add("fDIV cycles", c);
                }
                other => {
                    warn!("record not priced by the stack-distance interpreter, skipping: {other:?}");
                }
            }
        }

        time += cycles / self.machine.clockspeed * self.thread_efficiency();
        stats.set("Thread Efficiency", self.thread_efficiency());
        CostResult { time, cycles, stats }
    }

    /// Effective load latency and reciprocal throughput in seconds, derived
    /// from the first stack-distance record in the tasklist. `None` when the
    /// tasklist carries no such record.
    pub fn mem_access_time(&self, tasklist: &[Op]) -> Option<(f64, f64)> {
        let (distances, probabilities) = tasklist.iter().find_map(|op| match op {
            Op::MemAccessDist { distances, probabilities, .. } => {
                Some((distances, probabilities))
            }
            _ => None,
        })?;
        let rates = self.distribution_rates(distances, probabilities);
        let (l_eff, b_eff) = self.effective_access_cycles(&rates);
        Some((l_eff / self.machine.clockspeed, b_eff / self.machine.clockspeed))
    }

    /// Run every named task graph through the pipeline simulator, with the
    /// load unit retimed from the tasklist's memory behavior.
    pub fn time_compute_taskgraph(
        &self,
        graphs: &BTreeMap<String, TaskGraph>,
        tasklist: &[Op],
    ) -> Result<BTreeMap<String, GraphTiming>, SimError> {
        let mut engine = PipelineEngine::from_machine(&self.machine)?;
        match self.mem_access_time(tasklist) {
            Some((latency, throughput)) => engine.set_load_timing(latency, throughput)?,
            None => warn!("no stack-distance record in tasklist, keeping preset load timing"),
        }
        let mut timings = BTreeMap::new();
        for (name, graph) in graphs {
            timings.insert(name.clone(), engine.simulate(graph)?);
        }
        Ok(timings)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Chain one load population through registers, the cache levels and
    /// main memory; returns the cycles charged and records traffic stats.
    fn charge_memory_chain(&self, rates: &[f64], p: &LoadProfile, stats: &mut Stats) -> f64 {
        let m = &self.machine;

        // Index loads land in registers as far as they fit.
        let loads_per_var = if p.index_vars > 0.0 { p.index_loads / p.index_vars } else { 0.0 };
        let reg_accesses = (m.num_registers * loads_per_var).trunc();
        let nonreg_index_loads = (p.index_loads - reg_accesses).max(0.0);

        let vars_per_page = if p.avg_dist > 0.0 { m.ram_page_size / p.avg_dist } else { 1.0 };

        let mut float_loads = p.float_loads;
        let initial_ram_pages = if p.new_call {
            // First touch by a new call: the float working set pages in once
            // from main memory and those loads leave the cache population.
            float_loads -= p.float_vars;
            p.float_vars / vars_per_page
        } else {
            0.0
        };

        let mut cycles = m.ram_cycles() * initial_ram_pages;
        cycles += reg_accesses * m.register_cycles;

        // Each level serves its hits; the misses are the next level's
        // reference population. Hit counts truncate to whole loads.
        let mut int_pool = nonreg_index_loads;
        let mut float_pool = float_loads;
        let mut traffic = Vec::with_capacity(m.cache.len());
        for (level, rate) in m.cache.iter().zip(rates) {
            let int_hits = (rate * int_pool).trunc();
            let float_hits = (rate * float_pool).trunc();
            let t = LevelTraffic {
                int_hits,
                float_hits,
                int_misses: int_pool - int_hits,
                float_misses: float_pool - float_hits,
            };
            cycles += level.cycles
                * (t.float_hits * m.float_word_bytes + t.int_hits * m.int_word_bytes)
                / level.line_size;
            int_pool = t.int_misses;
            float_pool = t.float_misses;
            traffic.push(t);
        }

        // Last-level misses page in from main memory.
        cycles += m.ram_cycles() * (int_pool + float_pool) / vars_per_page;

        if let Some(t) = traffic.first() {
            stats.add("L1_int_hits", t.int_hits);
            stats.add("L1_float_hits", t.float_hits);
            stats.add("L1_int_misses", t.int_misses);
            stats.add("L1_float_misses", t.float_misses);
            stats.add("L1 cycles", m.cache[0].cycles * (2.0 * t.float_hits + t.int_hits));
        }
        if let Some(t) = traffic.get(1) {
            stats.add("L2_int_hits", t.int_hits);
            stats.add("L2_float_hits", t.float_hits);
            stats.add("L2_int_misses", t.int_misses);
            stats.add("L2_float_misses", t.float_misses);
            stats.add("L2 cycles", m.cache[1].cycles * (2.0 * t.float_hits + t.int_hits));
            let ram_accesses = (2.0 * t.float_misses + t.int_misses) / vars_per_page;
            stats.add("RAM accesses", ram_accesses);
            stats.add("RAM cycles", m.ram_cycles() * ram_accesses);
        }

        cycles
    }

    /// Expected hit rate of every cache level for a distance histogram.
    fn distribution_rates(&self, distances: &[f64], probabilities: &[f64]) -> Vec<f64> {
        let llc = self.machine.llc_size();
        self.machine
            .cache
            .iter()
            .map(|lvl| hitrate::distribution_hit_rate(distances, probabilities, lvl, llc))
            .collect()
    }

    /// Effective latency and bandwidth of one access, both in cycles.
    fn effective_access_cycles(&self, rates: &[f64]) -> (f64, f64) {
        let latencies: Vec<f64> = self.machine.cache.iter().map(|l| l.cycles).collect();
        let bandwidths: Vec<f64> = self.machine.cache.iter().map(|l| l.bandwidth_cycles).collect();
        (
            hitrate::effective_cycles(rates, &latencies, self.machine.ram_cycles()),
            hitrate::effective_cycles(rates, &bandwidths, self.machine.bw_ram_miss_penalty()),
        )
    }

    fn level_cycles(&self, level: MemLevel) -> f64 {
        match level {
            MemLevel::L1 => {
                self.machine.cache.first().map_or(self.machine.ram_cycles(), |l| l.cycles)
            }
            MemLevel::L2 => {
                self.machine.cache.get(1).map_or(self.machine.ram_cycles(), |l| l.cycles)
            }
            // Deeper levels and plain RAM price at main-memory latency.
            _ => self.machine.ram_cycles(),
        }
    }

    fn check_device(&self, index: usize) -> bool {
        if index >= self.node.accelerators.len() {
            warn!("device {index} does not exist on this node, skipping device op");
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::GB;
    use crate::node::{Accelerator, DeviceModel};
    use crate::task::KernelCall;

    fn core_on<'a>(node: &'a mut Node, preset: &str) -> ProcessorCore<'a> {
        let machine = MachineConfig::by_name(preset).unwrap();
        ProcessorCore::new(machine, node)
    }

    #[test]
    fn alu_costs_follow_cycle_table() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "cielo");
        let r = core.time_compute(&[Op::Cpu(100.0), Op::Ialu(50.0)], 0.0);
        // 100 * 1.0 + 50 * 0.5 cycles at 2.4 GHz
        assert!((r.cycles - 125.0).abs() < 1e-12);
        assert!((r.time - 125.0 / 2.4e9).abs() < 1e-18);
        assert_eq!(r.stats.get("Thread Efficiency"), 1.0);
        assert_eq!(r.stats.get("L1 cycles"), 0.0);
    }

    #[test]
    fn pure_accumulation_commutes() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let list = [Op::Cpu(10.0), Op::Ialu(200.0), Op::Falu(30.0), Op::Fdiv(4.0)];
        let mut reversed = list.clone();
        reversed.reverse();
        let a = core.time_compute(&list, 0.0);
        let b = core.time_compute(&reversed, 0.0);
        assert!((a.time - b.time).abs() < 1e-18);
        assert!((a.cycles - b.cycles).abs() < 1e-12);
    }

    #[test]
    fn oversubscription_derates_conversion() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "cielo");
        core.active_threads = 2; // cielo has one hardware thread
        assert!((core.thread_efficiency() - 0.5).abs() < 1e-12);
        let r = core.time_compute(&[Op::Cpu(100.0)], 0.0);
        assert!((r.time - 100.0 / 2.4e9 * 0.5).abs() < 1e-18);
    }

    #[test]
    fn failed_alloc_costs_filesystem_time() {
        let mut node = Node::new(1000.0);
        let fs_time = node.filesystem_access_time;
        let mut core = core_on(&mut node, "mustang");
        let r = core.time_compute(&[Op::Alloc { bytes: 2000.0 }], 0.0);
        assert_eq!(r.cycles, 0.0);
        assert!((r.time - fs_time).abs() < 1e-12);
    }

    #[test]
    fn successful_alloc_costs_one_ram_access() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let ram = core.machine.ram_cycles();
        let r = core.time_compute(&[Op::Alloc { bytes: 512.0 }], 0.0);
        assert!((r.cycles - ram).abs() < 1e-12);
    }

    #[test]
    fn alloc_unalloc_round_trip_restores_footprint() {
        let mut node = Node::new(GB);
        {
            let mut core = core_on(&mut node, "mustang");
            core.time_compute(
                &[Op::Alloc { bytes: 4096.0 }, Op::Unalloc { bytes: 4096.0 }],
                0.0,
            );
        }
        assert_eq!(node.memory.in_use_bytes(), 0.0);
    }

    #[test]
    fn far_reuse_distances_cost_more() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let access = |reuse: f64| Op::MemAccess {
            index_vars: 100.0,
            float_vars: 1000.0,
            avg_dist: 8.0,
            avg_reuse_dist: reuse,
            stdev_reuse_dist: 64.0,
            index_loads: 1000.0,
            float_loads: 10000.0,
            new_call: false,
        };
        let near = core.time_compute(&[access(640.0)], 0.0);
        let far = core.time_compute(&[access(100.0 * 1024.0 * 1024.0)], 0.0);
        assert!(far.cycles > near.cycles);
        assert!(far.stats.get("RAM accesses") > near.stats.get("RAM accesses"));
    }

    #[test]
    fn explicit_hitrates_match_derived_ones() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let (reuse, spread) = (4096.0, 512.0);
        let rates: Vec<f64> = core
            .machine
            .cache
            .iter()
            .map(|lvl| hitrate::reuse_hit_rate(lvl, reuse, spread))
            .collect();
        let derived = core.time_compute(
            &[Op::MemAccess {
                index_vars: 100.0,
                float_vars: 1000.0,
                avg_dist: 8.0,
                avg_reuse_dist: reuse,
                stdev_reuse_dist: spread,
                index_loads: 1000.0,
                float_loads: 10000.0,
                new_call: true,
            }],
            0.0,
        );
        let explicit = core.time_compute(
            &[Op::HitRates {
                rates: [rates[0], rates[1], rates[2]],
                index_vars: 100.0,
                float_vars: 1000.0,
                avg_dist: 8.0,
                index_loads: 1000.0,
                float_loads: 10000.0,
                new_call: true,
            }],
            0.0,
        );
        assert!((derived.cycles - explicit.cycles).abs() < 1e-9);
        assert!(
            (derived.stats.get("RAM accesses") - explicit.stats.get("RAM accesses")).abs() < 1e-9
        );
    }

    #[test]
    fn kernel_overlaps_host_until_sync() {
        let mut node = Node::new(GB);
        node.accelerators.push(Box::new(DeviceModel::m2090()));
        let dev = DeviceModel::m2090();
        let mut core = core_on(&mut node, "cielo");
        let call = KernelCall {
            blocks: 1,
            threads_per_block: 1,
            flops_per_thread: dev.peak_flops, // one second of device compute
            bytes_per_thread: 8.0,
        };
        let busy_cycles = dev.kernel_call(&call, 0.0) * core.machine.clockspeed;
        let r = core.time_compute(
            &[
                Op::KernelCall { device: 0, call },
                Op::Cpu(100.0),
                Op::DeviceSync { device: 0 },
            ],
            0.0,
        );
        // The hundred host cycles hide inside the device time.
        assert!((r.cycles - busy_cycles).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_device_is_skipped() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "cielo");
        let r = core.time_compute(
            &[Op::DeviceSync { device: 3 }, Op::DeviceTransfer { device: 7, bytes: 1.0e6 }],
            0.0,
        );
        assert_eq!(r.cycles, 0.0);
        assert_eq!(r.time, 0.0);
    }

    #[test]
    fn dist_interpreter_skips_foreign_records() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let r = core.time_compute_amm(&[
            Op::InterNode { bytes: 1.0e6 },
            Op::Cpu(100.0),
        ]);
        assert!((r.cycles - 100.0).abs() < 1e-12);
        assert_eq!(r.time, r.cycles / core.machine.clockspeed);
    }

    #[test]
    fn all_hit_histogram_prices_at_l1() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        let r = core.time_compute_amm(&[Op::MemAccessDist {
            distances: vec![0.0],
            probabilities: vec![1.0],
            block_size: 1.0,
            total_bytes: 800.0,
        }]);
        // Every access hits L1: 100 accesses at 4 cycles.
        let l1 = core.machine.cache[0].cycles;
        assert!((r.cycles - 100.0 * l1).abs() < 1e-9);
        assert!((r.stats.get("L1_hit_rate") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn load_timing_comes_from_first_histogram() {
        let mut node = Node::new(GB);
        let mut core = core_on(&mut node, "mustang");
        core.active_threads = 1;
        let list = [Op::MemAccessDist {
            distances: vec![0.0],
            probabilities: vec![1.0],
            block_size: 4.0,
            total_bytes: 4096.0,
        }];
        let (lat, bw) = core.mem_access_time(&list).unwrap();
        let m = &core.machine;
        assert!((lat - m.cache[0].cycles / m.clockspeed).abs() < 1e-15);
        assert!((bw - m.cache[0].bandwidth_cycles / m.clockspeed).abs() < 1e-15);
        assert!(core.mem_access_time(&[Op::Cpu(1.0)]).is_none());
    }
}
