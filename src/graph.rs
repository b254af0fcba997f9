/// Instruction task graphs.
///
/// A task graph is one basic block's instruction-dependency DAG: vertex ids
/// mapped to an instruction kind and the ids that depend on it. The input
/// graph stays read-only; simulation works on a prepared index form and
/// reports completion times separately.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::machine::PipelineClass;

/// One instruction vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskVertex {
    /// Instruction kind name, classified into a pipeline class at prepare
    /// time
    pub inst: String,
    /// Ids of the vertices that need this one finished first
    #[serde(default)]
    pub children: Vec<String>,
}

/// Structural faults that make a graph unsimulatable.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A vertex names a child that is not in the graph.
    #[error("vertex {parent} lists unknown child {child}")]
    UnknownChild { parent: String, child: String },
    /// The child relation loops; such a graph would never drain.
    #[error("dependency cycle through vertex {0}")]
    Cycle(String),
}

/// Dependency graph of one basic block, keyed by vertex id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph(BTreeMap<String, TaskVertex>);

impl TaskGraph {
    pub fn new() -> TaskGraph {
        TaskGraph::default()
    }

    pub fn insert(&mut self, id: &str, inst: &str, children: &[&str]) {
        self.0.insert(
            id.to_string(),
            TaskVertex {
                inst: inst.to_string(),
                children: children.iter().map(|c| (*c).to_string()).collect(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskVertex)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve names to dense indices, count parents, and reject graphs
    /// that could never drain. Vertex order follows sorted ids.
    pub(crate) fn prepare(&self) -> Result<PreparedGraph, GraphError> {
        let ids: Vec<String> = self.0.keys().cloned().collect();
        let index: BTreeMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

        let mut children = Vec::with_capacity(ids.len());
        let mut parent_counts = vec![0usize; ids.len()];
        for (id, vertex) in self.0.iter() {
            let mut out = Vec::with_capacity(vertex.children.len());
            for child in &vertex.children {
                let Some(&c) = index.get(child.as_str()) else {
                    return Err(GraphError::UnknownChild {
                        parent: id.clone(),
                        child: child.clone(),
                    });
                };
                parent_counts[c] += 1;
                out.push(c);
            }
            children.push(out);
        }

        // Kahn pass over a scratch copy of the counts; anything left with
        // parents sits on a cycle.
        let mut remaining = parent_counts.clone();
        let mut work: Vec<usize> =
            (0..ids.len()).filter(|&v| remaining[v] == 0).collect();
        let mut processed = 0;
        while let Some(v) = work.pop() {
            processed += 1;
            for &c in &children[v] {
                remaining[c] -= 1;
                if remaining[c] == 0 {
                    work.push(c);
                }
            }
        }
        if processed < ids.len() {
            if let Some(v) = (0..ids.len()).find(|&v| remaining[v] > 0) {
                return Err(GraphError::Cycle(ids[v].clone()));
            }
        }

        let kinds = self
            .0
            .values()
            .map(|vertex| PipelineClass::from_name(&vertex.inst))
            .collect();

        Ok(PreparedGraph { ids, kinds, children, parent_counts })
    }
}

/// Indexed form of a task graph, ready for the pipeline simulator.
#[derive(Debug)]
pub(crate) struct PreparedGraph {
    /// Vertex ids in sorted order; all other vectors align with this
    pub ids: Vec<String>,
    pub kinds: Vec<PipelineClass>,
    pub children: Vec<Vec<usize>>,
    pub parent_counts: Vec<usize>,
}

/// Completion report of one simulated task graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphTiming {
    /// Simulated seconds until the last vertex completed
    pub total_time: f64,
    /// Per-vertex completion stamps
    pub time_done: BTreeMap<String, f64>,
}
