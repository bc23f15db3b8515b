//! Capability agents
//!
//! A capability node is a bounded tool-calling loop: the model is prompted
//! with its role, the team roster and the supervisor's instructions, may call
//! its tools for up to `max_iterations` rounds, and its final text becomes a
//! single message named after the node.

use crate::error::Result;
use crate::store::OutputStore;
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use cohort_core::messages::history;
use cohort_core::{GraphError, Message, Node, RunContext};
use llm::{ChatMessage, ChatModel, ChatRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    pub answer: String,
    pub rounds: usize,
    pub tool_calls: usize,
}

/// Model plus tools, run until the model answers without calling a tool
#[derive(Clone)]
pub struct ToolAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl ToolAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Tool failures are reported back to the model; model failures abort.
    pub async fn run(&self, mut transcript: Vec<ChatMessage>, ctx: &RunContext) -> Result<AgentOutcome> {
        let specs = self.tools.specs();
        let mut tool_calls = 0;

        for round in 1..=self.max_iterations {
            let request = ChatRequest::new(transcript.clone()).with_tools(specs.clone());
            let response = self.model.chat(request).await?;

            let calls = response.message.tool_calls.clone();
            if calls.is_empty() {
                return Ok(AgentOutcome {
                    answer: response.message.content,
                    rounds: round,
                    tool_calls,
                });
            }

            transcript.push(response.message);
            for call in &calls {
                tool_calls += 1;
                let output = match self.tools.execute(call, ctx).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool call failed");
                        format!("Error: {}", e)
                    }
                };
                debug!(tool = %call.name, bytes = output.len(), "Tool call finished");
                transcript.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        warn!(max = self.max_iterations, "Agent stopped without a final answer");
        Ok(AgentOutcome {
            answer: format!(
                "Stopped after {} tool rounds without a final answer.",
                self.max_iterations
            ),
            rounds: self.max_iterations,
            tool_calls,
        })
    }
}

/// Opening and closing system prompts around the conversation
pub fn agent_prompts(
    role_prompt: &str,
    team_members: &[String],
    instructions: &str,
    tool_names: &[String],
) -> (String, String) {
    let opening = format!(
        "{}\nWork autonomously according to your speciality, using the tools available to you. \
         Do not ask for clarification. Your other team members (and other teams) will collaborate \
         with you with their own specification. You are chosen for a reason! You are one of the \
         following team members: {}.",
        role_prompt,
        team_members.join(", ")
    );
    let closing = format!(
        "Supervisor instructions: {}\nRemember, you individually can only use these tools: {}\n\n\
         End if you have already completed requested task. Communicate the work completed.",
        instructions,
        tool_names.join(", ")
    );
    (opening, closing)
}

/// A graph node wrapping a [`ToolAgent`]
pub struct CapabilityNode {
    name: String,
    role_prompt: String,
    agent: ToolAgent,
    /// Load the thread's persisted document as context before running
    document: Option<Arc<dyn OutputStore>>,
    /// State field that receives the thread id of a loaded document
    record_field: Option<String>,
}

impl CapabilityNode {
    pub fn new(name: impl Into<String>, role_prompt: impl Into<String>, agent: ToolAgent) -> Self {
        Self {
            name: name.into(),
            role_prompt: role_prompt.into(),
            agent,
            document: None,
            record_field: None,
        }
    }

    /// Read the thread's document before each run and fold it into
    /// `current_data`.
    pub fn with_document(mut self, store: Arc<dyn OutputStore>) -> Self {
        self.document = Some(store);
        self
    }

    /// Also write the id of the loaded record into `field`
    pub fn tracking_record(mut self, field: impl Into<String>) -> Self {
        self.record_field = Some(field.into());
        self
    }

    async fn load_document(&self, ctx: &RunContext) -> Result<Option<String>> {
        let (Some(store), Some(thread_id)) = (&self.document, ctx.thread_id()) else {
            return Ok(None);
        };
        Ok(store.read(thread_id).await?.map(|record| record.content))
    }

    fn team_members(&self, state: &Value) -> Vec<String> {
        let members: Vec<String> = state
            .get("team_members")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if members.is_empty() {
            vec![self.name.clone()]
        } else {
            members
        }
    }

    async fn run(&self, state: &Value, ctx: &RunContext, document: Option<&str>) -> Result<String> {
        let current_data = document
            .or_else(|| state.get("current_data").and_then(Value::as_str))
            .unwrap_or_default();
        let role = if current_data.is_empty() {
            self.role_prompt.clone()
        } else {
            format!("{}\n{}", self.role_prompt, current_data)
        };
        let instructions = state
            .get("instructions")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (opening, closing) = agent_prompts(
            &role,
            &self.team_members(state),
            instructions,
            &self.agent.tools().names(),
        );

        let mut transcript = vec![ChatMessage::system(opening)];
        transcript.extend(history(state).iter().map(ChatMessage::from));
        transcript.push(ChatMessage::system(closing));

        let outcome = self.agent.run(transcript, ctx).await?;
        debug!(
            node = %self.name,
            rounds = outcome.rounds,
            tool_calls = outcome.tool_calls,
            "Agent finished"
        );
        Ok(outcome.answer)
    }
}

#[async_trait]
impl Node for CapabilityNode {
    async fn invoke(&self, state: Value, ctx: &RunContext) -> cohort_core::Result<Value> {
        let document = self.load_document(ctx).await.map_err(GraphError::from)?;
        let answer = self
            .run(&state, ctx, document.as_deref())
            .await
            .map_err(GraphError::from)?;

        let message = Message::human(answer).with_name(self.name.clone());
        let mut update = json!({ "messages": [message.to_value()] });
        if let Some(content) = document {
            let seen = state
                .get("current_data")
                .and_then(Value::as_str)
                .is_some_and(|current| current.ends_with(content.as_str()));
            if !content.is_empty() && !seen {
                update["current_data"] = json!(content);
            }
            if let (Some(field), Some(thread_id)) = (&self.record_field, ctx.thread_id()) {
                update[field.as_str()] = json!(thread_id);
            }
        }
        Ok(update)
    }
}
