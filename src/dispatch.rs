/// Task-graph scheduler.
///
/// A single cooperative process that drains completed instructions, releases
/// their children, and hands ready vertices to pipeline units. It hibernates
/// between bursts and is woken by whichever unit finishes an instruction.
use crate::engine::CoreShared;
use crate::graph::PreparedGraph;
use crate::runtime::{Context, Process, Verdict};

pub(crate) struct GraphScheduler {
    /// Child indices per vertex
    children: Vec<Vec<usize>>,
    /// Half-open unit index range serving each vertex's instruction class
    vertex_units: Vec<(usize, usize)>,
    /// Vertices whose parents have all completed, awaiting dispatch
    ready: Vec<usize>,
    /// Vertices not yet completed
    outstanding: usize,
}

impl GraphScheduler {
    pub(crate) fn new(graph: &PreparedGraph, vertex_units: Vec<(usize, usize)>) -> GraphScheduler {
        let ready = graph
            .parent_counts
            .iter()
            .enumerate()
            .filter(|&(_, &parents)| parents == 0)
            .map(|(v, _)| v)
            .collect();
        GraphScheduler {
            children: graph.children.clone(),
            vertex_units,
            ready,
            outstanding: graph.ids.len(),
        }
    }

    fn drain_completions(&mut self, shared: &mut CoreShared, now: f64) {
        while let Some(v) = shared.done.pop_front() {
            self.outstanding -= 1;
            shared.status[v].done = true;
            shared.status[v].time_done = now;
            for &child in &self.children[v] {
                shared.status[child].parents_outstanding -= 1;
                if shared.status[child].parents_outstanding == 0 {
                    self.ready.push(child);
                }
            }
        }
    }

    fn dispatch_ready(&mut self, shared: &mut CoreShared, ctx: &mut Context<'_>) {
        let ready = std::mem::take(&mut self.ready);
        for v in ready {
            let (lo, hi) = self.vertex_units[v];
            let unit = match (lo..hi).find(|&u| !shared.unit_active[u]) {
                Some(idle) => {
                    // Claim it now so the next ready vertex in this burst
                    // picks a different idle replica.
                    shared.unit_active[idle] = true;
                    ctx.wake(shared.unit_pids[idle]);
                    idle
                }
                // All replicas busy: queue behind the shortest backlog.
                None => {
                    let mut best = lo;
                    for u in lo + 1..hi {
                        if shared.queues[u].len() < shared.queues[best].len() {
                            best = u;
                        }
                    }
                    best
                }
            };
            shared.queues[unit].push_back(v);
            shared.status[v].in_pipeline = true;
        }
    }
}

impl Process<CoreShared> for GraphScheduler {
    fn resume(&mut self, shared: &mut CoreShared, ctx: &mut Context<'_>) -> Verdict {
        shared.scheduler_active = true;

        self.drain_completions(shared, ctx.now);
        self.dispatch_ready(shared, ctx);

        shared.total_time = ctx.now;
        if self.outstanding == 0 {
            Verdict::Done
        } else {
            shared.scheduler_active = false;
            Verdict::Hibernate
        }
    }
}
