/// Machine parameter presets.
///
/// Each preset is one immutable table of clock speed, cache geometry,
/// per-operation cycle costs and functional-unit timings for a modeled
/// machine, selected by name at construction time. Cache latencies and
/// bandwidths follow vendor data sheets and measured values (Intel MLC,
/// 7-cpu) for the corresponding hardware.
use std::collections::BTreeMap;
use std::fmt;

/// Nanosecond in seconds.
pub const NS: f64 = 1.0e-9;
/// Kilobyte in bytes.
pub const KB: f64 = 1024.0;
/// Megabyte in bytes.
pub const MB: f64 = 1024.0 * 1024.0;
/// Gigabyte in bytes.
pub const GB: f64 = 1024.0 * 1024.0 * 1024.0;

// Measured read+write transfer cycles per 8-byte word (7-cpu, Magny-Cours).
const L1_BW_CYCLES: f64 = 4.0 / 8.0;
const L2_BW_CYCLES: f64 = ((2.2 + 2.3) / 2.0 + 6.1) / 2.0 / 8.0;
const L3_BW_CYCLES: f64 = ((4.7 + 5.0) / 2.0 + 8.4) / 2.0 / 8.0;
// Sustained DRAM stream bandwidth measured with the Intel MLC tool.
const MEASURED_BW_RAM: f64 = 20222.0937 * MB;

// ---------------------------------------------------------------------------
// Cache levels
// ---------------------------------------------------------------------------

/// Geometry and access costs of one cache level.
#[derive(Debug, Clone)]
pub struct CacheLevel {
    /// Capacity in bytes
    pub size: f64,
    /// Line size in bytes
    pub line_size: f64,
    /// Access latency in cycles
    pub cycles: f64,
    /// Set associativity
    pub associativity: f64,
    /// Transfer cost in cycles per 8-byte word
    pub bandwidth_cycles: f64,
}

impl CacheLevel {
    /// Number of lines this level holds.
    pub fn lines(&self) -> f64 {
        self.size / self.line_size
    }
}

// ---------------------------------------------------------------------------
// Pipeline classes
// ---------------------------------------------------------------------------

/// Functional-unit classes that task-graph instructions dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineClass {
    Iadd,
    Fadd,
    Idiv,
    Fdiv,
    Imul,
    Fmul,
    Alu,
    Br,
    Load,
    Store,
    Unknown,
}

impl PipelineClass {
    /// Classify an instruction-kind name; anything unrecognized lands in the
    /// catch-all `Unknown` pool.
    pub fn from_name(name: &str) -> PipelineClass {
        match name {
            "iadd" => PipelineClass::Iadd,
            "fadd" => PipelineClass::Fadd,
            "idiv" => PipelineClass::Idiv,
            "fdiv" => PipelineClass::Fdiv,
            "imul" => PipelineClass::Imul,
            "fmul" => PipelineClass::Fmul,
            "alu" => PipelineClass::Alu,
            "br" => PipelineClass::Br,
            "load" => PipelineClass::Load,
            "store" => PipelineClass::Store,
            _ => PipelineClass::Unknown,
        }
    }
}

impl fmt::Display for PipelineClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineClass::Iadd    => write!(f, "iadd"),
            PipelineClass::Fadd    => write!(f, "fadd"),
            PipelineClass::Idiv    => write!(f, "idiv"),
            PipelineClass::Fdiv    => write!(f, "fdiv"),
            PipelineClass::Imul    => write!(f, "imul"),
            PipelineClass::Fmul    => write!(f, "fmul"),
            PipelineClass::Alu     => write!(f, "alu"),
            PipelineClass::Br      => write!(f, "br"),
            PipelineClass::Load    => write!(f, "load"),
            PipelineClass::Store   => write!(f, "store"),
            PipelineClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Replica count and timing of one functional-unit class.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Number of independent replicas of this unit
    pub replicas: usize,
    /// Issue-to-completion latency in seconds
    pub latency: f64,
    /// Interval between completions in seconds
    pub throughput: f64,
}

impl PipelineSpec {
    /// Sequential stage slots: `floor(latency / throughput)`.
    pub fn depth(&self) -> usize {
        (self.latency / self.throughput).floor() as usize
    }
}

/// Replica counts and timings for the generic functional-unit set
/// (Magny-Cours derived). Load timing is typically overridden per workload
/// from measured memory-access behavior.
pub fn default_pipelines() -> BTreeMap<PipelineClass, PipelineSpec> {
    use PipelineClass::*;
    let table = [
        (Iadd, 2, 3e-8, 3e-9),
        (Fadd, 2, 3e-8, 3e-9),
        (Idiv, 2, 1e-8, 1e-9),
        (Fdiv, 2, 32e-8, 32e-9),
        (Imul, 2, 2e-8, 2e-9),
        (Fmul, 2, 2e-8, 2e-9),
        (Alu, 2, 3e-8, 3e-9),
        (Br, 1, 1e-9, 1e-9),
        (Load, 2, 2e-8, 2e-9),
        (Store, 2, 2e-8, 2e-9),
        (Unknown, 1, 1e-8, 1e-9),
    ];
    table
        .into_iter()
        .map(|(class, replicas, latency, throughput)| {
            (class, PipelineSpec { replicas, latency, throughput })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Machine configuration
// ---------------------------------------------------------------------------

/// Full parameter set for one modeled machine. Read-only during any cost
/// computation or simulation.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Preset name as accepted by `by_name`
    pub name: &'static str,
    /// Core clock in Hz
    pub clockspeed: f64,
    /// Hardware thread count
    pub hwthreads: u32,
    /// Upper bound on active software threads
    pub maxthreads: u32,
    /// Vector unit width in bytes
    pub vector_width: u32,
    /// Bytes per integer word
    pub int_word_bytes: f64,
    /// Bytes per float word
    pub float_word_bytes: f64,
    /// Registers available for index variables
    pub num_registers: f64,
    /// Cycles per register access
    pub register_cycles: f64,
    /// Cache hierarchy, innermost level first
    pub cache: Vec<CacheLevel>,
    /// Main memory page size in bytes
    pub ram_page_size: f64,
    /// Main memory access latency in seconds
    pub ram_latency: f64,
    /// Sustained DRAM bandwidth in bytes/second
    pub bw_ram: f64,
    /// Cycles per generic CPU operation
    pub cycles_per_cpu_op: f64,
    /// Cycles per integer ALU operation
    pub cycles_per_ialu: f64,
    /// Cycles per float ALU operation
    pub cycles_per_falu: f64,
    /// Cycles per float division
    pub cycles_per_division: f64,
    /// Cycles per integer vector operation
    pub cycles_per_int_vec: f64,
    /// Cycles per float vector operation
    pub cycles_per_vector_op: f64,
    /// Functional-unit pool for the pipeline simulator
    pub pipelines: BTreeMap<PipelineClass, PipelineSpec>,
}

impl MachineConfig {
    /// Main memory latency expressed in cycles.
    pub fn ram_cycles(&self) -> f64 {
        self.ram_latency * self.clockspeed
    }

    /// DRAM bandwidth miss penalty in cycles per 8-byte word.
    pub fn bw_ram_miss_penalty(&self) -> f64 {
        1.0 / self.bw_ram * self.clockspeed / 8.0
    }

    /// Last-level cache capacity in bytes.
    pub fn llc_size(&self) -> f64 {
        self.cache.last().map(|l| l.size).unwrap_or(0.0)
    }

    /// Look up a preset by its registered name.
    pub fn by_name(name: &str) -> Option<MachineConfig> {
        match name {
            "cielo" => Some(MachineConfig::cielo()),
            "mlintel" => Some(MachineConfig::mlintel()),
            "edison" => Some(MachineConfig::edison()),
            "mustang" => Some(MachineConfig::mustang()),
            "i7" => Some(MachineConfig::i7()),
            "grizzly" => Some(MachineConfig::grizzly()),
            _ => None,
        }
    }

    /// Preset names accepted by `by_name`.
    pub fn names() -> &'static [&'static str] {
        &["cielo", "mlintel", "edison", "mustang", "i7", "grizzly"]
    }

    /// AMD Magny-Cours node of a Cray XE6 (Cielo).
    pub fn cielo() -> Self {
        let clock = 2.40e9;
        MachineConfig {
            name: "cielo",
            clockspeed: clock,
            hwthreads: 1,
            maxthreads: 16,
            vector_width: 16,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 64.0 * KB,
                    line_size: 64.0,
                    cycles: 1.0 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 512.0 * KB,
                    line_size: 64.0,
                    cycles: 5.0 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 1.5 * MB,
                    line_size: 64.0,
                    cycles: 25.0 * NS * clock,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 60.0 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 1.0,
            cycles_per_ialu: 0.5,
            cycles_per_falu: 1.0,
            cycles_per_division: 10.0,
            cycles_per_int_vec: 0.1,
            cycles_per_vector_op: 0.5,
            pipelines: default_pipelines(),
        }
    }

    /// Intel Sandy Bridge (ML cluster node).
    pub fn mlintel() -> Self {
        let clock = 2.60e9;
        MachineConfig {
            name: "mlintel",
            clockspeed: clock,
            hwthreads: 32,
            maxthreads: 32,
            vector_width: 32,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 32.0 * KB,
                    line_size: 64.0,
                    cycles: 0.3 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 256.0 * KB,
                    line_size: 64.0,
                    cycles: 4.0 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 2.5 * MB,
                    line_size: 64.0,
                    cycles: 16.0 * NS * clock,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 50.0 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 1.0,
            cycles_per_ialu: 0.3,
            cycles_per_falu: 0.3,
            cycles_per_division: 3.0,
            cycles_per_int_vec: 0.075,
            cycles_per_vector_op: 0.075,
            pipelines: default_pipelines(),
        }
    }

    /// Intel Ivy Bridge node of a Cray XC30 (Edison).
    pub fn edison() -> Self {
        let clock = 2.40e9;
        MachineConfig {
            name: "edison",
            clockspeed: clock,
            hwthreads: 48,
            maxthreads: 48,
            vector_width: 32,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 32.0 * KB,
                    line_size: 64.0,
                    cycles: 0.3 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 256.0 * KB,
                    line_size: 64.0,
                    cycles: 4.0 * NS * clock,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 2.5 * MB,
                    line_size: 64.0,
                    cycles: 16.0 * NS * clock,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 50.0 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 1.0,
            cycles_per_ialu: 0.3,
            cycles_per_falu: 0.3,
            cycles_per_division: 3.0,
            cycles_per_int_vec: 0.075,
            cycles_per_vector_op: 0.075,
            pipelines: default_pipelines(),
        }
    }

    /// AMD Magny-Cours HPC node (Mustang). Cache cycle counts and DRAM
    /// bandwidth come from measurement rather than data sheets.
    pub fn mustang() -> Self {
        let clock = 2.3e9;
        MachineConfig {
            name: "mustang",
            clockspeed: clock,
            hwthreads: 32,
            maxthreads: 32,
            vector_width: 32,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 64.0 * KB,
                    line_size: 64.0,
                    cycles: 4.0,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 512.0 * KB,
                    line_size: 64.0,
                    cycles: 10.0,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 12.0 * MB,
                    line_size: 64.0,
                    cycles: 65.0,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 10.8 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 1.0,
            cycles_per_ialu: 0.1,
            cycles_per_falu: 0.1,
            cycles_per_division: 1.0,
            cycles_per_int_vec: 0.075,
            cycles_per_vector_op: 0.15,
            pipelines: default_pipelines(),
        }
    }

    /// Intel i7-4770HQ (Haswell).
    pub fn i7() -> Self {
        let clock = 2.2e9;
        MachineConfig {
            name: "i7",
            clockspeed: clock,
            hwthreads: 36,
            maxthreads: 36,
            vector_width: 32,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 256.0 * KB,
                    line_size: 64.0,
                    cycles: 4.0,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 1024.0 * KB,
                    line_size: 64.0,
                    cycles: 12.0,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 6.0 * MB,
                    line_size: 64.0,
                    cycles: 36.0,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 10.8 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 4.5,
            cycles_per_ialu: 0.45,
            cycles_per_falu: 0.45,
            cycles_per_division: 52.5,
            cycles_per_int_vec: 0.075,
            cycles_per_vector_op: 0.15,
            pipelines: default_pipelines(),
        }
    }

    /// Intel Xeon Broadwell E5-2695v4 (Grizzly), L3 is a SmartCache.
    pub fn grizzly() -> Self {
        let clock = 2.1e9;
        MachineConfig {
            name: "grizzly",
            clockspeed: clock,
            hwthreads: 36,
            maxthreads: 36,
            vector_width: 32,
            int_word_bytes: 4.0,
            float_word_bytes: 8.0,
            num_registers: 16.0,
            register_cycles: 1.0,
            cache: vec![
                CacheLevel {
                    size: 64.0 * KB,
                    line_size: 64.0,
                    cycles: 4.0,
                    associativity: 8.0,
                    bandwidth_cycles: L1_BW_CYCLES,
                },
                CacheLevel {
                    size: 256.0 * KB,
                    line_size: 64.0,
                    cycles: 10.0,
                    associativity: 8.0,
                    bandwidth_cycles: L2_BW_CYCLES,
                },
                CacheLevel {
                    size: 45.0 * MB,
                    line_size: 64.0,
                    cycles: 65.0,
                    associativity: 20.0,
                    bandwidth_cycles: L3_BW_CYCLES,
                },
            ],
            ram_page_size: 4096.0,
            ram_latency: 10.8 * NS,
            bw_ram: MEASURED_BW_RAM,
            cycles_per_cpu_op: 4.5,
            cycles_per_ialu: 0.45,
            cycles_per_falu: 0.40,
            cycles_per_division: 55.0,
            cycles_per_int_vec: 0.075,
            cycles_per_vector_op: 0.15,
            pipelines: default_pipelines(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve_by_name() {
        for name in MachineConfig::names() {
            let m = MachineConfig::by_name(name).unwrap();
            assert_eq!(m.name, *name);
            assert_eq!(m.cache.len(), 3);
            assert!(m.clockspeed > 1.0e9);
        }
        assert!(MachineConfig::by_name("epyc").is_none());
    }

    #[test]
    fn cielo_ram_cycles_follow_latency() {
        let m = MachineConfig::cielo();
        // 60 ns at 2.4 GHz
        assert!((m.ram_cycles() - 144.0).abs() < 1e-9);
    }

    #[test]
    fn mustang_llc_is_12_mb() {
        let m = MachineConfig::mustang();
        assert!((m.llc_size() - 12.0 * MB).abs() < 1e-9);
    }

    #[test]
    fn bandwidth_penalty_is_per_word() {
        let m = MachineConfig::mustang();
        let per_byte = m.clockspeed / m.bw_ram;
        assert!((m.bw_ram_miss_penalty() - per_byte / 8.0).abs() < 1e-12);
    }

    #[test]
    fn pipeline_depths_are_positive() {
        for (class, spec) in default_pipelines() {
            assert!(spec.depth() >= 1, "{class} has zero depth");
            assert!(spec.replicas >= 1, "{class} has no replicas");
        }
    }

    #[test]
    fn branch_unit_has_depth_one() {
        let pipes = default_pipelines();
        assert_eq!(pipes[&PipelineClass::Br].depth(), 1);
    }

    #[test]
    fn unrecognized_kind_degrades_to_unknown() {
        assert_eq!(PipelineClass::from_name("iadd"), PipelineClass::Iadd);
        assert_eq!(PipelineClass::from_name("fused_madd"), PipelineClass::Unknown);
    }
}
