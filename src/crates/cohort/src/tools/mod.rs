//! Tools available to capability agents
//!
//! A [`Tool`] is a named async function with a JSON-schema input. Agents
//! advertise tools to the model through [`ToolRegistry::specs`] and execute
//! the calls it makes with [`ToolRegistry::execute`]. Tools receive the
//! [`RunContext`] so persistence can be keyed by the run's thread id.
//!
//! | Tool | Team | Effect |
//! |------|------|--------|
//! | `web_search` | research | Tavily search |
//! | `scrape_webpage` | research | fetch and flatten a page |
//! | `write_document` / `update_document` / `read_document` | documents | thread document |
//! | `generate_chart` | charts | SVG chart, stored on the thread |

pub mod chart;
pub mod document;
pub mod scrape;
pub mod search;

pub use chart::{ChartKind, ChartSpec, ChartTool, DataPoint};
pub use document::{ReadDocumentTool, UpdateDocumentTool, WriteDocumentTool};
pub use scrape::ScrapeTool;
pub use search::WebSearchTool;

use crate::error::{CohortError, Result};
use async_trait::async_trait;
use cohort_core::RunContext;
use llm::{ToolCall, ToolSpec};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn input_schema(&self) -> Value;

    /// Run the tool; the returned text is shown to the model
    async fn execute(&self, input: Value, ctx: &RunContext) -> Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.input_schema())
    }
}

/// Deserialize tool arguments, naming the tool on failure
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| CohortError::invalid_input(tool, e.to_string()))
}

/// Ordered set of tools an agent may call
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    /// Registering a name twice replaces the earlier tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a model-issued call.
    ///
    /// Unknown tools and raw-string arguments are input errors.
    pub async fn execute(&self, call: &ToolCall, ctx: &RunContext) -> Result<String> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| CohortError::ToolExecution(format!("Tool not found: {}", call.name)))?;

        let input = match &call.arguments {
            Value::String(raw) if raw.trim().is_empty() => Value::Object(Default::default()),
            Value::String(raw) => {
                return Err(CohortError::invalid_input(
                    &call.name,
                    format!("arguments are not valid JSON: {}", raw),
                ))
            }
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        tool.execute(input, ctx).await
    }
}
