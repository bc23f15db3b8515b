//! Compiled graphs as nodes
//!
//! [`SubgraphNode`] lets a whole child graph stand in for a single node of a
//! parent graph:
//!
//! 1. the entry adapter maps parent state to the child's input,
//! 2. the child runs to termination in a child [`RunContext`] (same thread
//!    id and run scope, new run id),
//! 3. the exit adapter folds the child's final state into one parent update.
//!
//! The parent sees exactly one step; the child's own steps are only logged.
//!
//! ```rust,ignore
//! let team = build_research_team(oracle)?; // CompiledGraph
//! parent.add_subgraph(
//!     "ResearchTeam",
//!     team,
//!     project_messages(Vec::<String>::new()),
//!     last_message(),
//! )?;
//! ```

use crate::compiled::CompiledGraph;
use crate::context::RunContext;
use crate::error::Result;
use crate::graph::Node;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Parent state to child input
pub type EntryAdapter = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Child final state to parent update
pub type ExitAdapter = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

pub struct SubgraphNode {
    name: String,
    graph: CompiledGraph,
    entry: EntryAdapter,
    exit: ExitAdapter,
}

impl SubgraphNode {
    pub fn new(
        name: impl Into<String>,
        graph: CompiledGraph,
        entry: EntryAdapter,
        exit: ExitAdapter,
    ) -> Self {
        Self {
            name: name.into(),
            graph,
            entry,
            exit,
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }
}

/// Wrap `graph` as a node named after the graph
pub fn as_node(graph: CompiledGraph, entry: EntryAdapter, exit: ExitAdapter) -> SubgraphNode {
    let name = graph.name().to_string();
    SubgraphNode::new(name, graph, entry, exit)
}

#[async_trait]
impl Node for SubgraphNode {
    async fn invoke(&self, state: Value, ctx: &RunContext) -> Result<Value> {
        let input = (self.entry)(&state)?;
        let child_ctx = ctx.child();
        tracing::debug!(
            subgraph = %self.name,
            parent_run = %ctx.run_id(),
            child_run = %child_ctx.run_id(),
            "Entering subgraph"
        );

        let final_state = self.graph.invoke(input, child_ctx).await?;
        let update = (self.exit)(&final_state)?;

        tracing::debug!(subgraph = %self.name, "Leaving subgraph");
        Ok(update)
    }
}

/// Entry adapter copying the parent's `messages` and, when non-empty, seeding
/// the child's `team_members`.
pub fn project_messages<I, S>(team_members: I) -> EntryAdapter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let members: Vec<String> = team_members.into_iter().map(Into::into).collect();
    Arc::new(move |parent: &Value| {
        let mut input = Map::new();
        input.insert(
            "messages".to_string(),
            parent.get("messages").cloned().unwrap_or_else(|| json!([])),
        );
        if !members.is_empty() {
            input.insert("team_members".to_string(), json!(members));
        }
        Ok(Value::Object(input))
    })
}

/// Exit adapter forwarding only the child's last message; no messages means
/// an empty update.
pub fn last_message() -> ExitAdapter {
    Arc::new(|child: &Value| {
        let last = child
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.last());
        Ok(match last {
            Some(message) => json!({ "messages": [message] }),
            None => json!({}),
        })
    })
}
