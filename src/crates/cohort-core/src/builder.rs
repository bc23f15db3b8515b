//! Graph builder
//!
//! [`StateGraph`] accumulates nodes and edges against a [`StateSchema`] and
//! compiles them into an immutable [`CompiledGraph`]. The same builder is used
//! at every nesting level: a team graph and the top-level graph are assembled
//! identically, and a compiled team can be dropped into its parent as a node
//! through [`StateGraph::add_subgraph`].
//!
//! # Validation
//!
//! - `add_node` rejects duplicates and the reserved names `__start__`/`__end__`.
//! - `add_edge` / `add_conditional_edge` require the *source* to be registered;
//!   destinations are checked by `compile()`, which reports every dangling
//!   reference at once.
//! - `set_entry_point` requires a registered node.
//! - After `compile()` every mutator fails with [`GraphError::GraphFrozen`].
//!
//! # Example
//!
//! ```rust
//! use cohort_core::{RunContext, SchemaField, StateGraph, StateSchema, END};
//! use serde_json::json;
//!
//! # tokio_test(async {
//! let schema = StateSchema::new().field(SchemaField::append("log"));
//! let mut graph = StateGraph::new(schema);
//! graph.add_node("greet", |_state, _ctx| {
//!     Box::pin(async move { Ok(json!({"log": ["hello"]})) })
//! })?;
//! graph.add_edge("__start__", "greet")?;
//! graph.add_edge("greet", END)?;
//!
//! let compiled = graph.compile()?;
//! let state = compiled.invoke(json!({}), RunContext::standalone()).await?;
//! assert_eq!(state["log"], json!(["hello"]));
//! # Ok::<(), cohort_core::GraphError>(())
//! # });
//! # fn tokio_test<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use crate::compiled::{CompiledGraph, GraphPlan, DEFAULT_STEP_LIMIT};
use crate::context::RunContext;
use crate::error::{DanglingEdge, GraphError, Result};
use crate::graph::{
    field_selector, ConditionalEdge, FnNode, Node, NodeEdges, NodeFuture, NodeId, Selector, END,
    START,
};
use crate::routing::{RouteOptions, FINISH};
use crate::state::StateSchema;
use crate::subgraph::{EntryAdapter, ExitAdapter, SubgraphNode};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub struct StateGraph {
    name: String,
    schema: StateSchema,
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    order: Vec<NodeId>,
    edges: HashMap<NodeId, NodeEdges>,
    entry: Option<NodeId>,
    step_limit: usize,
    frozen: bool,
}

impl StateGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self::named("graph", schema)
    }

    /// Builder whose compiled graph logs under `name`
    pub fn named(name: impl Into<String>, schema: StateSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: HashMap::new(),
            entry: None,
            step_limit: DEFAULT_STEP_LIMIT,
            frozen: false,
        }
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Node names in registration order
    pub fn node_names(&self) -> &[NodeId] {
        &self.order
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(GraphError::GraphFrozen)
        } else {
            Ok(())
        }
    }

    fn ensure_registered(&self, name: &str) -> Result<()> {
        if self.nodes.contains_key(name) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(name.to_string()))
        }
    }

    /// Register an async closure as a node.
    ///
    /// ```rust,ignore
    /// graph.add_node("echo", |state, ctx| {
    ///     Box::pin(async move { Ok(json!({"messages": [state["input"].clone()]})) })
    /// })?;
    /// ```
    pub fn add_node<F>(&mut self, name: impl Into<NodeId>, handler: F) -> Result<&mut Self>
    where
        F: Fn(Value, RunContext) -> NodeFuture + Send + Sync + 'static,
    {
        self.add_node_arc(name, Arc::new(FnNode::new(handler)))
    }

    /// Register any [`Node`] implementation
    pub fn add_node_instance(
        &mut self,
        name: impl Into<NodeId>,
        node: impl Node + 'static,
    ) -> Result<&mut Self> {
        self.add_node_arc(name, Arc::new(node))
    }

    pub fn add_node_arc(&mut self, name: impl Into<NodeId>, node: Arc<dyn Node>) -> Result<&mut Self> {
        self.ensure_mutable()?;
        let name = name.into();
        if name == START || name == END {
            return Err(GraphError::ReservedName(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.insert(name.clone(), node);
        self.order.push(name);
        Ok(self)
    }

    /// Register a compiled child graph as a single node.
    ///
    /// `entry` maps parent state to the child's input; `exit` folds the child's
    /// final state into one parent update.
    pub fn add_subgraph(
        &mut self,
        name: impl Into<NodeId>,
        child: CompiledGraph,
        entry: EntryAdapter,
        exit: ExitAdapter,
    ) -> Result<&mut Self> {
        let name = name.into();
        let node = SubgraphNode::new(name.clone(), child, entry, exit);
        self.add_node_arc(name, Arc::new(node))
    }

    /// Static transition. `add_edge(START, x)` is the same as `set_entry_point(x)`.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Result<&mut Self> {
        self.ensure_mutable()?;
        let from = from.into();
        let to = to.into();
        if from == START {
            return self.set_entry_point(to);
        }
        self.ensure_registered(&from)?;
        let edges = self.edges.entry(from.clone()).or_default();
        if edges.direct.is_some() {
            return Err(GraphError::DuplicateEdge {
                node: from,
                kind: "static",
            });
        }
        edges.direct = Some(to);
        Ok(self)
    }

    /// Runtime transition chosen by `selector` and looked up in `branches`.
    pub fn add_conditional_edge<F, I, K, V>(
        &mut self,
        from: impl Into<NodeId>,
        selector: F,
        branches: I,
    ) -> Result<&mut Self>
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NodeId>,
    {
        self.add_selector_edge(from, Arc::new(selector), branches)
    }

    fn add_selector_edge<I, K, V>(
        &mut self,
        from: impl Into<NodeId>,
        selector: Selector,
        branches: I,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<NodeId>,
    {
        self.ensure_mutable()?;
        let from = from.into();
        self.ensure_registered(&from)?;
        let branches: BTreeMap<String, NodeId> = branches
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let edges = self.edges.entry(from.clone()).or_default();
        if edges.conditional.is_some() {
            return Err(GraphError::DuplicateEdge {
                node: from,
                kind: "conditional",
            });
        }
        edges.conditional = Some(ConditionalEdge::new(selector, branches));
        Ok(self)
    }

    /// Supervisor routing: read `field`, go to the named delegate, or to
    /// `finish_target` on `FINISH`.
    ///
    /// The branch table is generated from `options`, so it covers every
    /// option the supervisor can emit.
    pub fn add_routing_edges(
        &mut self,
        from: impl Into<NodeId>,
        field: &str,
        options: &RouteOptions,
        finish_target: impl Into<NodeId>,
    ) -> Result<&mut Self> {
        let mut branches: Vec<(String, NodeId)> = options
            .delegates()
            .iter()
            .map(|d| (d.clone(), d.clone()))
            .collect();
        branches.push((FINISH.to_string(), finish_target.into()));
        self.add_selector_edge(from, field_selector(field), branches)
    }

    pub fn set_entry_point(&mut self, name: impl Into<NodeId>) -> Result<&mut Self> {
        self.ensure_mutable()?;
        let name = name.into();
        self.ensure_registered(&name)?;
        self.entry = Some(name);
        Ok(self)
    }

    /// Step bound for runs of the compiled graph
    pub fn set_step_limit(&mut self, limit: usize) -> Result<&mut Self> {
        self.ensure_mutable()?;
        self.step_limit = limit;
        Ok(self)
    }

    fn dangling_edges(&self) -> Vec<DanglingEdge> {
        let mut dangling = Vec::new();
        for source in &self.order {
            let Some(edges) = self.edges.get(source) else {
                continue;
            };
            for target in edges.targets() {
                if target != END && !self.nodes.contains_key(target) {
                    dangling.push(DanglingEdge {
                        source: source.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
        dangling
    }

    /// Validate and freeze the graph.
    ///
    /// Reachability of `END` is not required; termination is enforced at run
    /// time by supervisors and the step limit.
    pub fn compile(&mut self) -> Result<CompiledGraph> {
        self.ensure_mutable()?;
        let entry = self.entry.clone().ok_or(GraphError::MissingEntryPoint)?;

        let dangling = self.dangling_edges();
        if !dangling.is_empty() {
            return Err(GraphError::UnresolvedEdgeTarget { edges: dangling });
        }

        self.frozen = true;
        tracing::debug!(
            graph = %self.name,
            nodes = self.order.len(),
            entry = %entry,
            "Compiled graph"
        );

        let plan = GraphPlan {
            name: self.name.clone(),
            schema: self.schema.clone(),
            nodes: self.nodes.clone(),
            order: self.order.clone(),
            edges: self.edges.clone(),
            entry,
        };
        Ok(CompiledGraph::new(plan, self.step_limit))
    }
}
