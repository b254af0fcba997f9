/// Pipelined functional units.
///
/// Each unit replica is one cooperative process advancing a fixed number of
/// stage slots once per throughput interval. A full unit completes one
/// instruction per tick; a lone instruction takes the whole depth to drain
/// through. Units park themselves when empty and are woken by the
/// scheduler on dispatch.
use crate::engine::CoreShared;
use crate::runtime::{Context, Process, Verdict};

/// Lifecycle between hibernations.
enum UnitPhase {
    /// Created but never run; the first resume parks the unit
    Startup,
    /// Parked empty; the next resume is a wake with work queued
    Drained,
    /// Advancing stages once per throughput interval
    Ticking,
}

/// One replica of a functional-unit class.
pub(crate) struct PipelineUnit {
    /// Index into the shared queue and activity tables
    unit_index: usize,
    /// Seconds between stage advances
    throughput: f64,
    /// Stage slots; instructions enter at the back and complete at slot 0
    stages: Vec<Option<usize>>,
    /// Consecutive ticks with nothing admitted
    idle_ticks: usize,
    phase: UnitPhase,
}

impl PipelineUnit {
    pub(crate) fn new(unit_index: usize, depth: usize, throughput: f64) -> PipelineUnit {
        PipelineUnit {
            unit_index,
            throughput,
            stages: vec![None; depth],
            idle_ticks: 0,
            phase: UnitPhase::Startup,
        }
    }

    fn tick(&mut self, shared: &mut CoreShared, ctx: &mut Context<'_>) -> Verdict {
        // Slot 0 holds a finished instruction.
        if let Some(v) = self.stages[0].take() {
            shared.done.push_back(v);
            if !shared.scheduler_active {
                ctx.wake(shared.scheduler_pid);
            }
        }

        // Advance one stage; the emptied slot 0 wraps to the back.
        self.stages.rotate_left(1);

        let depth = self.stages.len();
        if let Some(v) = shared.queues[self.unit_index].pop_front() {
            self.stages[depth - 1] = Some(v);
            self.idle_ticks = 0;
        } else {
            self.idle_ticks += 1;
            if self.idle_ticks == depth {
                // Nothing left in flight. Park until the next dispatch.
                shared.unit_active[self.unit_index] = false;
                self.phase = UnitPhase::Drained;
                return Verdict::Hibernate;
            }
        }
        Verdict::Sleep(self.throughput)
    }
}

impl Process<CoreShared> for PipelineUnit {
    fn resume(&mut self, shared: &mut CoreShared, ctx: &mut Context<'_>) -> Verdict {
        match self.phase {
            UnitPhase::Startup => {
                shared.unit_active[self.unit_index] = false;
                self.phase = UnitPhase::Drained;
                Verdict::Hibernate
            }
            UnitPhase::Drained => {
                shared.unit_active[self.unit_index] = true;
                self.idle_ticks = 0;
                self.phase = UnitPhase::Ticking;
                Verdict::Sleep(self.throughput)
            }
            UnitPhase::Ticking => self.tick(shared, ctx),
        }
    }
}
