//! Compiled, executable graphs
//!
//! A [`CompiledGraph`] is the frozen output of
//! [`StateGraph::compile`](crate::StateGraph::compile). It is cheap to clone
//! and can drive any number of independent runs concurrently; each run owns
//! its own state and [`RunContext`](crate::RunContext) scope.
//!
//! # Execution modes
//!
//! - [`CompiledGraph::stream`] yields one [`StepEvent`] per executed node,
//!   lazily, as the caller polls.
//! - [`CompiledGraph::invoke`] drives the same loop to completion and returns
//!   the final merged state.
//!
//! Within a run nodes execute strictly one at a time in the order edges are
//! followed. A step counter bounds every run; exceeding it fails the run with
//! [`GraphError::StepLimitExceeded`](crate::GraphError::StepLimitExceeded).

mod execution;
mod graph;
mod introspection;
mod streaming;
mod types;

pub use graph::{CompiledGraph, DEFAULT_STEP_LIMIT};
pub(crate) use graph::GraphPlan;
pub use types::{EventStream, StepEvent};
