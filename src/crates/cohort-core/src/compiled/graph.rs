//! The compiled graph type

use crate::graph::{Node, NodeEdges, NodeId};
use crate::state::StateSchema;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default bound on steps per run
pub const DEFAULT_STEP_LIMIT: usize = 25;

/// Frozen nodes, edges and schema shared by every run of a compiled graph
pub(crate) struct GraphPlan {
    pub(crate) name: String,
    pub(crate) schema: StateSchema,
    pub(crate) nodes: HashMap<NodeId, Arc<dyn Node>>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) edges: HashMap<NodeId, NodeEdges>,
    pub(crate) entry: NodeId,
}

/// Executable graph. Clones share the same plan.
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) plan: Arc<GraphPlan>,
    pub(crate) step_limit: usize,
}

impl CompiledGraph {
    pub(crate) fn new(plan: GraphPlan, step_limit: usize) -> Self {
        Self {
            plan: Arc::new(plan),
            step_limit,
        }
    }

    /// Same graph with a different step bound
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn step_limit(&self) -> usize {
        self.step_limit
    }

    pub fn name(&self) -> &str {
        &self.plan.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.plan.schema
    }

    pub fn entry_point(&self) -> &str {
        &self.plan.entry
    }

    /// Node names in registration order
    pub fn node_names(&self) -> &[NodeId] {
        &self.plan.order
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.plan.nodes.contains_key(name)
    }

    pub fn edges_of(&self, name: &str) -> Option<&NodeEdges> {
        self.plan.edges.get(name)
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.plan.name)
            .field("entry", &self.plan.entry)
            .field("nodes", &self.plan.order)
            .field("step_limit", &self.step_limit)
            .finish()
    }
}
