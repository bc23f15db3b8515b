//! Lazy step streams

use super::types::EventStream;
use super::CompiledGraph;
use crate::context::RunContext;
use serde_json::Value;

impl CompiledGraph {
    /// Stream the run one step at a time.
    ///
    /// Nothing executes until the stream is polled; each poll runs exactly
    /// one node. The stream ends after the step that reaches `__end__`. On
    /// failure it yields a single `Err` and then ends. Every call starts a
    /// fresh run from `input`.
    pub fn stream(&self, input: Value, ctx: RunContext) -> EventStream {
        let graph = self.clone();
        Box::pin(async_stream::stream! {
            tracing::info!(graph = %graph.name(), thread_id = ?ctx.thread_id(), "Streaming run");
            match graph.executor(&input, ctx) {
                Err(e) => yield Err(e),
                Ok(mut executor) => loop {
                    match executor.next_step().await {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!(graph = %graph.name(), error = %e, "Run failed");
                            yield Err(e);
                            break;
                        }
                    }
                },
            }
        })
    }
}
