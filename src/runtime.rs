/// Discrete-event cooperative runtime.
///
/// Simulated processes share one state value and take turns: the engine
/// pops the earliest pending resume, runs that process until it returns a
/// verdict, then applies the wakes the step requested. Ties at one
/// simulated time resolve in scheduling order, so a run is deterministic
/// with no reliance on host threading.
use log::trace;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

pub type ProcessId = usize;

/// What a process does after one resume step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Resume again after a simulated delay in seconds
    Sleep(f64),
    /// Park until another process wakes this one
    Hibernate,
    /// Finished for good
    Done,
}

/// Engine view handed to the running process.
pub struct Context<'a> {
    /// Current simulated time in seconds
    pub now: f64,
    wakes: &'a mut Vec<ProcessId>,
}

impl Context<'_> {
    /// Resume a hibernating process at the current time, after the running
    /// process suspends. Waking a scheduled or finished process is a no-op.
    pub fn wake(&mut self, pid: ProcessId) {
        self.wakes.push(pid);
    }
}

/// One cooperative simulated process.
pub trait Process<S> {
    fn resume(&mut self, shared: &mut S, ctx: &mut Context<'_>) -> Verdict;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProcState {
    Hibernating,
    Scheduled,
    Finished,
}

/// Pending resume. Orders by time, then by scheduling sequence so that
/// same-time events replay in the order they were created.
#[derive(Debug, Clone, Copy)]
struct Event {
    time: f64,
    seq: u64,
    pid: ProcessId,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

struct Slot<S> {
    name: String,
    state: ProcState,
    process: Box<dyn Process<S>>,
}

/// Event-driven dispatcher for processes sharing state `S`.
///
/// Each process has at most one pending resume: a sleeping process is
/// scheduled, a hibernating one has nothing queued until someone wakes it.
pub struct Engine<S> {
    now: f64,
    seq: u64,
    events: BinaryHeap<Reverse<Event>>,
    procs: Vec<Slot<S>>,
}

impl<S> Engine<S> {
    pub fn new() -> Engine<S> {
        Engine { now: 0.0, seq: 0, events: BinaryHeap::new(), procs: Vec::new() }
    }

    /// Register a process. It stays parked until started.
    pub fn add_process(&mut self, name: &str, process: Box<dyn Process<S>>) -> ProcessId {
        let pid = self.procs.len();
        self.procs.push(Slot { name: name.to_string(), state: ProcState::Hibernating, process });
        pid
    }

    /// Schedule the first resume of a parked process at the current time.
    pub fn start(&mut self, pid: ProcessId) {
        if self.procs[pid].state == ProcState::Hibernating {
            self.schedule(pid, 0.0);
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, pid: ProcessId, delay: f64) {
        self.procs[pid].state = ProcState::Scheduled;
        self.seq += 1;
        self.events.push(Reverse(Event { time: self.now + delay, seq: self.seq, pid }));
    }

    fn wake(&mut self, pid: ProcessId) {
        if self.procs[pid].state == ProcState::Hibernating {
            self.schedule(pid, 0.0);
        }
    }

    /// Replay events until none remain; returns the final simulated time.
    pub fn run(&mut self, shared: &mut S) -> f64 {
        let mut wakes = Vec::new();
        while let Some(Reverse(event)) = self.events.pop() {
            self.now = event.time;
            let slot = &mut self.procs[event.pid];
            trace!("t={:.3e}s resume {}", event.time, slot.name);
            let verdict = {
                let mut ctx = Context { now: self.now, wakes: &mut wakes };
                slot.process.resume(shared, &mut ctx)
            };
            match verdict {
                Verdict::Sleep(delay) => self.schedule(event.pid, delay),
                Verdict::Hibernate => self.procs[event.pid].state = ProcState::Hibernating,
                Verdict::Done => self.procs[event.pid].state = ProcState::Finished,
            }
            for pid in wakes.drain(..) {
                self.wake(pid);
            }
        }
        self.now
    }
}

impl<S> Default for Engine<S> {
    fn default() -> Self {
        Engine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Logs `(label, now)` on every resume, then sleeps through its script.
    struct Script {
        label: usize,
        delays: Vec<f64>,
    }

    impl Process<Vec<(usize, f64)>> for Script {
        fn resume(&mut self, shared: &mut Vec<(usize, f64)>, ctx: &mut Context<'_>) -> Verdict {
            shared.push((self.label, ctx.now));
            if self.delays.is_empty() {
                Verdict::Done
            } else {
                Verdict::Sleep(self.delays.remove(0))
            }
        }
    }

    /// Hibernates once, logs on the second resume.
    struct Parked {
        label: usize,
        parked: bool,
    }

    impl Process<Vec<(usize, f64)>> for Parked {
        fn resume(&mut self, shared: &mut Vec<(usize, f64)>, ctx: &mut Context<'_>) -> Verdict {
            if !self.parked {
                self.parked = true;
                return Verdict::Hibernate;
            }
            shared.push((self.label, ctx.now));
            Verdict::Done
        }
    }

    /// Sleeps, then wakes its target twice in one step.
    struct Waker {
        target: ProcessId,
    }

    impl Process<Vec<(usize, f64)>> for Waker {
        fn resume(&mut self, _shared: &mut Vec<(usize, f64)>, ctx: &mut Context<'_>) -> Verdict {
            ctx.wake(self.target);
            ctx.wake(self.target);
            Verdict::Done
        }
    }

    #[test]
    fn events_replay_in_time_then_schedule_order() {
        let mut engine: Engine<Vec<(usize, f64)>> = Engine::new();
        let a = engine.add_process("a", Box::new(Script { label: 0, delays: vec![3.0] }));
        let b = engine.add_process("b", Box::new(Script { label: 1, delays: vec![1.0, 1.0] }));
        engine.start(a);
        engine.start(b);
        let mut log = Vec::new();
        let end = engine.run(&mut log);
        assert_eq!(log, [(0, 0.0), (1, 0.0), (1, 1.0), (1, 2.0), (0, 3.0)]);
        assert_eq!(end, 3.0);
    }

    #[test]
    fn duplicate_wakes_resume_once() {
        let mut engine: Engine<Vec<(usize, f64)>> = Engine::new();
        let parked = engine.add_process("parked", Box::new(Parked { label: 7, parked: false }));
        let waker = engine.add_process("waker", Box::new(Waker { target: parked }));
        engine.start(parked);
        engine.start(waker);
        let mut log = Vec::new();
        engine.run(&mut log);
        assert_eq!(log, [(7, 0.0)]);
    }

    #[test]
    fn run_without_events_is_a_no_op() {
        let mut engine: Engine<Vec<(usize, f64)>> = Engine::new();
        engine.add_process("idle", Box::new(Parked { label: 0, parked: false }));
        let mut log = Vec::new();
        assert_eq!(engine.run(&mut log), 0.0);
        assert!(log.is_empty());
    }
}
