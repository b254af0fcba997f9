pub mod cost;
mod dispatch;
pub mod engine;
pub mod graph;
pub mod hitrate;
pub mod machine;
pub mod node;
mod pipeline;
pub mod report;
pub mod runtime;
pub mod task;
