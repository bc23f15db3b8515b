//! # cohort-core - supervisor-routed state graphs
//!
//! The engine behind hierarchical agent teams. A graph is a set of named
//! nodes joined by static and conditional edges; every node reads a snapshot
//! of shared run state and returns a partial update that is merged back
//! through per-field reducers.
//!
//! ## Building blocks
//!
//! - [`StateSchema`] / [`SchemaField`] declare run state and how updates merge
//!   ([`AppendReducer`], [`OverrideReducer`], [`TextAccumulateReducer`]).
//! - [`StateGraph`] registers nodes and edges and compiles them into a
//!   [`CompiledGraph`].
//! - [`CompiledGraph::stream`] runs the graph lazily, one [`StepEvent`] per
//!   node; [`CompiledGraph::invoke`] runs it to completion.
//! - [`Supervisor`] is a node that asks a [`DecisionOracle`] where to go next
//!   and stops repeated delegation.
//! - [`SubgraphNode`] runs a whole compiled graph as one step of a parent.
//!
//! ## Termination
//!
//! Structural loops are legal. Runs end when a transition reaches [`END`];
//! supervisors force `FINISH` after too many visits to one delegate, and every
//! run is bounded by a step limit (default [`DEFAULT_STEP_LIMIT`]).
//!
//! ## Example
//!
//! ```rust
//! use cohort_core::testing::ScriptedOracle;
//! use cohort_core::{
//!     RouteOptions, RunContext, SchemaField, StateGraph, StateSchema, Supervisor, END,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let schema = StateSchema::new()
//!     .field(SchemaField::append("messages"))
//!     .field(SchemaField::overriding("next"))
//!     .field(SchemaField::overriding("reasoning"))
//!     .field(SchemaField::overriding("instructions"));
//!
//! let options = RouteOptions::new(["Worker"]);
//! let oracle = Arc::new(ScriptedOracle::sequence(["Worker", "FINISH"]));
//!
//! let mut graph = StateGraph::named("team", schema);
//! graph.add_node_instance(
//!     "supervisor",
//!     Supervisor::new("supervisor", "Manage {team_members}.", options.clone(), oracle),
//! )?;
//! graph.add_node("Worker", |_state, _ctx| {
//!     Box::pin(async move {
//!         Ok(json!({"messages": [{"role": "ai", "content": "done", "name": "Worker"}]}))
//!     })
//! })?;
//! graph.add_edge("Worker", "supervisor")?;
//! graph.add_routing_edges("supervisor", "next", &options, END)?;
//! graph.set_entry_point("supervisor")?;
//!
//! let state = graph
//!     .compile()?
//!     .invoke(json!({"messages": [{"role": "human", "content": "go"}]}), RunContext::standalone())
//!     .await?;
//! assert_eq!(state["messages"].as_array().unwrap().len(), 2);
//! assert_eq!(state["next"], "FINISH");
//! # Ok::<(), cohort_core::GraphError>(())
//! # }).unwrap();
//! ```

pub mod builder;
pub mod compiled;
pub mod context;
pub mod error;
pub mod graph;
pub mod messages;
pub mod routing;
pub mod state;
pub mod subgraph;
pub mod supervisor;
pub mod testing;

pub use builder::StateGraph;
pub use compiled::{CompiledGraph, EventStream, StepEvent, DEFAULT_STEP_LIMIT};
pub use context::{RunContext, RunScope};
pub use error::{DanglingEdge, ErrorKind, GraphError, Result};
pub use graph::{FnNode, Node, NodeFuture, NodeId, END, START};
pub use messages::{Message, Role};
pub use routing::{Route, RouteOptions, FINISH};
pub use state::{
    AppendReducer, OverrideReducer, Reducer, SchemaField, StateError, StateSchema,
    TextAccumulateReducer,
};
pub use subgraph::{as_node, last_message, project_messages, SubgraphNode};
pub use supervisor::{
    DecisionOracle, DecisionRequest, OracleOutcome, RawDecision, RoutingDecision, Supervisor,
    VisitCounter,
};
