//! The step loop

use super::graph::GraphPlan;
use super::types::StepEvent;
use super::CompiledGraph;
use crate::context::RunContext;
use crate::error::{GraphError, Result};
use crate::graph::{NodeId, END};
use serde_json::Value;
use std::sync::Arc;

/// Drives a single run one node at a time.
///
/// Each call to [`next_step`](Executor::next_step) invokes the current node,
/// merges its update, and resolves the next destination against the merged
/// state. Once the terminal marker is reached, or any step fails, the
/// executor is exhausted and returns `Ok(None)`.
pub(crate) struct Executor {
    plan: Arc<GraphPlan>,
    ctx: RunContext,
    state: Value,
    current: Option<NodeId>,
    step: usize,
    limit: usize,
}

impl Executor {
    pub(crate) fn start(
        plan: Arc<GraphPlan>,
        input: &Value,
        ctx: RunContext,
        limit: usize,
    ) -> Result<Self> {
        let state = plan.schema.initial_state(input)?;
        let current = Some(plan.entry.clone());
        Ok(Self {
            plan,
            ctx,
            state,
            current,
            step: 0,
            limit,
        })
    }

    pub(crate) fn into_state(self) -> Value {
        self.state
    }

    pub(crate) async fn next_step(&mut self) -> Result<Option<StepEvent>> {
        let Some(node_name) = self.current.take() else {
            return Ok(None);
        };

        self.step += 1;
        if self.step > self.limit {
            tracing::warn!(
                graph = %self.plan.name,
                limit = self.limit,
                node = %node_name,
                "Step limit exceeded"
            );
            return Err(GraphError::StepLimitExceeded { limit: self.limit });
        }

        let node = self
            .plan
            .nodes
            .get(&node_name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownNode(node_name.clone()))?;

        let update = node
            .invoke(self.state.clone(), &self.ctx)
            .await
            .map_err(|e| {
                tracing::error!(graph = %self.plan.name, node = %node_name, error = %e, "Node failed");
                e
            })?;

        let merged = self
            .plan
            .schema
            .merge(&self.state, &update)
            .map_err(|source| GraphError::StateUpdate {
                node: node_name.clone(),
                source,
            })?;

        let next = self.resolve(&node_name, &merged)?;
        self.state = merged;

        tracing::debug!(
            graph = %self.plan.name,
            depth = self.ctx.depth(),
            step = self.step,
            node = %node_name,
            next = %next,
            "Step complete"
        );

        if next != END {
            self.current = Some(next.clone());
        }

        Ok(Some(StepEvent {
            step: self.step,
            node: node_name,
            update,
            state: self.state.clone(),
            next,
        }))
    }

    fn resolve(&self, node: &str, state: &Value) -> Result<NodeId> {
        let edges = self.plan.edges.get(node);

        if let Some(conditional) = edges.and_then(|e| e.conditional()) {
            return conditional
                .resolve(state)
                .map(str::to_string)
                .map_err(|key| GraphError::NoMatchingBranch {
                    node: node.to_string(),
                    key,
                });
        }

        edges
            .and_then(|e| e.direct())
            .map(str::to_string)
            .ok_or_else(|| GraphError::NoOutgoingEdge(node.to_string()))
    }
}

impl CompiledGraph {
    pub(crate) fn executor(&self, input: &Value, ctx: RunContext) -> Result<Executor> {
        Executor::start(self.plan.clone(), input, ctx, self.step_limit)
    }

    /// Run to completion and return the final state
    #[tracing::instrument(skip(self, input, ctx), fields(graph = %self.plan.name, thread_id = ?ctx.thread_id()))]
    pub async fn invoke(&self, input: Value, ctx: RunContext) -> Result<Value> {
        let depth = ctx.depth();
        let mut executor = self.executor(&input, ctx)?;
        while executor.next_step().await?.is_some() {}
        if depth == 0 {
            tracing::info!(graph = %self.plan.name, "Run completed");
        }
        Ok(executor.into_state())
    }

    /// Run to completion, also returning every step event
    pub async fn invoke_with_trace(
        &self,
        input: Value,
        ctx: RunContext,
    ) -> Result<(Value, Vec<StepEvent>)> {
        let mut executor = self.executor(&input, ctx)?;
        let mut events = Vec::new();
        while let Some(event) = executor.next_step().await? {
            events.push(event);
        }
        Ok((executor.into_state(), events))
    }
}
