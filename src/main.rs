use std::collections::BTreeMap;

use env_logger::Env;
use log::debug;

use cpusim::cost::ProcessorCore;
use cpusim::graph::TaskGraph;
use cpusim::machine::{GB, MachineConfig};
use cpusim::node::{DeviceModel, Node};
use cpusim::report::{self, GraphSnapshot, LiveReport};
use cpusim::task::{KernelCall, Op};

/// One sweep of a 2-D five-point stencil over an n x n grid of doubles,
/// summarized the way a static loop analyzer would emit it.
fn stencil_tasklist(n: f64) -> Vec<Op> {
    let cells = n * n;
    let grid_bytes = cells * 8.0;
    vec![
        // Three arrays: u, unew, coefficients.
        Op::Alloc {
            bytes: 3.0 * grid_bytes,
        },
        Op::MemAccess {
            index_vars: 8.0,
            float_vars: 3.0 * cells,
            avg_dist: 8.0,
            avg_reuse_dist: 2.0 * n,
            stdev_reuse_dist: n / 2.0,
            index_loads: 2.0 * cells,
            float_loads: 5.0 * cells,
            new_call: true,
        },
        Op::Ialu(6.0 * cells),
        Op::Falu(5.0 * cells),
        Op::Vector {
            ops: 2.0 * cells,
            width: 32,
        },
        Op::Cpu(cells / 2.0),
        // Halo exchange: two ghost rows to the neighbors, one row locally.
        Op::InterNode { bytes: 2.0 * n * 8.0 },
        Op::IntraNode { bytes: n * 8.0 },
        Op::Unalloc {
            bytes: 3.0 * grid_bytes,
        },
    ]
}

/// The same sweep offloaded to the first accelerator.
fn offload_tasklist(n: f64) -> Vec<Op> {
    let cells = n * n;
    let grid_bytes = cells * 8.0;
    let call = KernelCall {
        blocks: (cells / 256.0).ceil() as u32,
        threads_per_block: 256,
        flops_per_thread: 48.0,
        bytes_per_thread: 40.0,
    };
    vec![
        Op::DeviceAlloc {
            device: 0,
            bytes: 2.0 * grid_bytes,
        },
        Op::DeviceTransfer {
            device: 0,
            bytes: grid_bytes,
        },
        Op::KernelCall { device: 0, call },
        // Host-side bookkeeping overlaps the kernel.
        Op::Ialu(cells / 4.0),
        Op::DeviceSync { device: 0 },
    ]
}

/// Histogram rendition of the sweep for the amortized-bandwidth model.
fn histogram_tasklist(n: f64) -> Vec<Op> {
    let cells = n * n;
    vec![
        Op::MemAccessDist {
            distances: vec![1.0, 64.0, 4096.0, 262_144.0, -1.0],
            probabilities: vec![0.45, 0.25, 0.15, 0.10, 0.05],
            block_size: 8.0,
            total_bytes: 3.0 * cells * 8.0,
        },
        Op::Ialu(6.0 * cells),
        Op::Falu(5.0 * cells),
        Op::Fdiv(cells / 100.0),
    ]
}

/// Dependency graph of one inner-loop body of the sweep.
fn stencil_graph() -> TaskGraph {
    let mut g = TaskGraph::new();
    g.insert("ld_n", "load", &["sum0"]);
    g.insert("ld_s", "load", &["sum0"]);
    g.insert("ld_e", "load", &["sum1"]);
    g.insert("ld_w", "load", &["sum1"]);
    g.insert("ld_c", "load", &["scale"]);
    g.insert("sum0", "fadd", &["sum2"]);
    g.insert("sum1", "fadd", &["sum2"]);
    g.insert("sum2", "fadd", &["scale"]);
    g.insert("scale", "fmul", &["st"]);
    g.insert("st", "store", &[]);
    g
}

/// Convergence check trailing each sweep.
fn residual_graph() -> TaskGraph {
    let mut g = TaskGraph::new();
    g.insert("ld0", "load", &["diff"]);
    g.insert("ld1", "load", &["diff"]);
    g.insert("diff", "fadd", &["sq"]);
    g.insert("sq", "fmul", &["acc"]);
    g.insert("acc", "fadd", &["test"]);
    g.insert("test", "br", &[]);
    g
}

fn class_mix(graph: &TaskGraph) -> Vec<(String, usize)> {
    let mut mix: BTreeMap<String, usize> = BTreeMap::new();
    for (_, vertex) in graph.iter() {
        *mix.entry(vertex.inst.clone()).or_insert(0) += 1;
    }
    mix.into_iter().collect()
}

fn main() {
    let env = Env::default().filter_or("CPUSIM_LOG", "info");
    env_logger::init_from_env(env);

    let name = std::env::args().nth(1).unwrap_or_else(|| "mustang".into());
    let machine = match MachineConfig::by_name(&name) {
        Some(machine) => machine,
        None => {
            eprintln!(
                "unknown machine '{}'; known presets: {}",
                name,
                MachineConfig::names().join(", ")
            );
            std::process::exit(1);
        }
    };
    println!(
        "Initialized {} at {:.2} GHz with {} cache levels, {} hardware threads",
        machine.name,
        machine.clockspeed / 1.0e9,
        machine.cache.len(),
        machine.hwthreads,
    );

    let mut node = Node::new(32.0 * GB);
    node.accelerators.push(Box::new(DeviceModel::m2090()));
    node.accelerators.push(Box::new(DeviceModel::k20x()));
    let mut core = ProcessorCore::new(machine, &mut node);

    report::write_report(&LiveReport {
        status: "running".into(),
        machine: core.machine.name.into(),
        clockspeed: core.machine.clockspeed,
        workload: "stencil sweep".into(),
        timestamp_ms: report::now_ms(),
        ..LiveReport::default()
    });

    // --- Five-point stencil sweep on the host ---
    let n = 1200.0;
    let tasklist = stencil_tasklist(n);
    let sweep = core.time_compute(&tasklist, 0.0);
    println!(
        "Stencil sweep ({}x{}): {:.3} ms predicted, {:.3e} cycles",
        n as u64,
        n as u64,
        sweep.time * 1.0e3,
        sweep.cycles,
    );
    println!(
        "Memory: {:.3e} L1 float hits | {:.3e} L2 float hits | {:.3e} RAM accesses",
        sweep.stats.get("L1_float_hits"),
        sweep.stats.get("L2_float_hits"),
        sweep.stats.get("RAM accesses"),
    );
    for (key, value) in sweep.stats.iter() {
        debug!("{key}: {value:.4e}");
    }
    report::write_report(&LiveReport {
        status: "running".into(),
        machine: core.machine.name.into(),
        clockspeed: core.machine.clockspeed,
        workload: "stencil sweep".into(),
        tasklist_len: tasklist.len(),
        predicted_time_s: sweep.time,
        cycles: sweep.cycles,
        thread_efficiency: core.thread_efficiency(),
        stats: sweep.stats.clone(),
        timestamp_ms: report::now_ms(),
        ..LiveReport::default()
    });

    // --- Same sweep offloaded to the first accelerator ---
    let offload = core.time_compute(&offload_tasklist(n), 0.0);
    println!("Offloaded sweep: {:.3} ms predicted", offload.time * 1.0e3);

    // --- Histogram rendition through the amortized-bandwidth model ---
    let amm_tasklist = histogram_tasklist(n);
    let amm = core.time_compute_amm(&amm_tasklist);
    println!(
        "Histogram model: {:.3} ms predicted, effective load latency {:.1} cycles",
        amm.time * 1.0e3,
        amm.stats.get("Effective Latency"),
    );

    // --- Inner-loop task graphs through the pipeline engine ---
    let mut graphs = BTreeMap::new();
    graphs.insert("stencil_inner".to_string(), stencil_graph());
    graphs.insert("residual_norm".to_string(), residual_graph());
    let mut last_graph = None;
    match core.time_compute_taskgraph(&graphs, &amm_tasklist) {
        Ok(timings) => {
            for (graph_name, timing) in &timings {
                println!(
                    "Graph {}: {} vertices retired in {:.3e} s",
                    graph_name,
                    timing.time_done.len(),
                    timing.total_time,
                );
            }
            last_graph = timings.iter().next_back().map(|(graph_name, timing)| {
                GraphSnapshot {
                    name: graph_name.clone(),
                    vertices: timing.time_done.len(),
                    total_time_s: timing.total_time,
                    class_mix: class_mix(&graphs[graph_name]),
                }
            });
        }
        Err(err) => eprintln!("task-graph replay failed: {err}"),
    }

    report::write_report(&LiveReport {
        status: "complete".into(),
        machine: core.machine.name.into(),
        clockspeed: core.machine.clockspeed,
        workload: "stencil sweep".into(),
        tasklist_len: tasklist.len(),
        predicted_time_s: sweep.time,
        cycles: sweep.cycles,
        thread_efficiency: core.thread_efficiency(),
        stats: sweep.stats.clone(),
        timestamp_ms: report::now_ms(),
        last_graph,
    });
}
