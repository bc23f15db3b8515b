//! Nodes, edges and reserved markers
//!
//! A node is anything implementing [`Node`]: it receives a snapshot of the
//! merged run state plus the [`RunContext`] and returns a *partial* update,
//! a JSON object holding only the fields it wants to change. Plain async
//! closures become nodes through [`FnNode`]; supervisors and subgraph adapters
//! implement the trait directly.
//!
//! Each registered node owns at most one static edge and at most one
//! conditional edge. When both exist the conditional edge decides.

use crate::context::RunContext;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Unique name of a node within its graph
pub type NodeId = String;

/// Entry alias accepted as the source of `add_edge`
pub const START: &str = "__start__";

/// Terminal marker; a transition here ends the run
pub const END: &str = "__end__";

/// A unit of work in a graph.
///
/// Returning `Value::Null` or `{}` means "no update".
#[async_trait]
pub trait Node: Send + Sync {
    async fn invoke(&self, state: Value, ctx: &RunContext) -> Result<Value>;
}

/// Boxed future returned by closure nodes
pub type NodeFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Adapts an async closure `|state, ctx| Box::pin(async move { ... })` into a [`Node`].
pub struct FnNode<F> {
    handler: F,
}

impl<F> FnNode<F>
where
    F: Fn(Value, RunContext) -> NodeFuture + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(Value, RunContext) -> NodeFuture + Send + Sync,
{
    async fn invoke(&self, state: Value, ctx: &RunContext) -> Result<Value> {
        (self.handler)(state, ctx.clone()).await
    }
}

/// Reads run state and returns the branch key to follow, if any.
pub type Selector = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A dynamically resolved transition
#[derive(Clone)]
pub struct ConditionalEdge {
    pub(crate) selector: Selector,
    pub(crate) branches: BTreeMap<String, NodeId>,
}

impl ConditionalEdge {
    pub fn new(selector: Selector, branches: BTreeMap<String, NodeId>) -> Self {
        Self { selector, branches }
    }

    /// Branch key to destination table
    pub fn branches(&self) -> &BTreeMap<String, NodeId> {
        &self.branches
    }

    /// Evaluate the selector and look up the destination.
    ///
    /// `Err` carries the key that matched nothing (empty if the selector
    /// produced no key at all).
    pub fn resolve(&self, state: &Value) -> std::result::Result<&str, String> {
        let key = (self.selector)(state).unwrap_or_default();
        self.branches
            .get(&key)
            .map(String::as_str)
            .ok_or(key)
    }
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("selector", &"<function>")
            .field("branches", &self.branches)
            .finish()
    }
}

/// Outgoing edges of a single node
#[derive(Debug, Clone, Default)]
pub struct NodeEdges {
    pub(crate) direct: Option<NodeId>,
    pub(crate) conditional: Option<ConditionalEdge>,
}

impl NodeEdges {
    pub fn direct(&self) -> Option<&str> {
        self.direct.as_deref()
    }

    pub fn conditional(&self) -> Option<&ConditionalEdge> {
        self.conditional.as_ref()
    }

    /// Every destination this node can reach, static first
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.direct.as_deref().into_iter().collect();
        if let Some(conditional) = &self.conditional {
            targets.extend(conditional.branches.values().map(String::as_str));
        }
        targets
    }
}

/// Selector reading a string field of run state
pub fn field_selector(field: impl Into<String>) -> Selector {
    let field = field.into();
    Arc::new(move |state: &Value| {
        state
            .get(&field)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_node_passes_context() {
        let node = FnNode::new(|state: Value, ctx: RunContext| {
            Box::pin(async move {
                Ok(json!({
                    "seen": state["x"],
                    "thread": ctx.thread_id().map(str::to_string),
                }))
            }) as NodeFuture
        });
        let ctx = RunContext::for_thread("42");
        let out = node.invoke(json!({"x": 1}), &ctx).await.unwrap();
        assert_eq!(out, json!({"seen": 1, "thread": "42"}));
    }

    #[test]
    fn test_conditional_resolve() {
        let edge = ConditionalEdge::new(
            field_selector("next"),
            BTreeMap::from([
                ("A".to_string(), "A".to_string()),
                ("FINISH".to_string(), END.to_string()),
            ]),
        );
        assert_eq!(edge.resolve(&json!({"next": "A"})), Ok("A"));
        assert_eq!(edge.resolve(&json!({"next": "FINISH"})), Ok(END));
        assert_eq!(edge.resolve(&json!({"next": "B"})), Err("B".to_string()));
        assert_eq!(edge.resolve(&json!({})), Err(String::new()));
    }

    #[test]
    fn test_node_edges_targets() {
        let edges = NodeEdges {
            direct: Some("b".into()),
            conditional: Some(ConditionalEdge::new(
                field_selector("next"),
                BTreeMap::from([("c".to_string(), "c".to_string())]),
            )),
        };
        assert_eq!(edges.targets(), vec!["b", "c"]);
    }
}
