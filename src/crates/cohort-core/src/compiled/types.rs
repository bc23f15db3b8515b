use crate::error::Result;
use crate::graph::NodeId;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;

/// One executed node within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    /// 1-based position of this step in the run
    pub step: usize,
    /// Node that ran
    pub node: NodeId,
    /// Partial update the node returned
    pub update: Value,
    /// Run state after the update was merged
    pub state: Value,
    /// Resolved destination; `__end__` on the final step
    pub next: NodeId,
}

impl StepEvent {
    pub fn is_final(&self) -> bool {
        self.next == crate::graph::END
    }
}

/// Lazy sequence of steps produced by [`CompiledGraph::stream`](super::CompiledGraph::stream)
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StepEvent>> + Send>>;
