//! Routing decisions from a chat model.
//!
//! [`LlmOracle`] turns a [`DecisionRequest`] into a function-calling prompt
//! and forces the model to answer through a single `route` tool whose
//! `next` argument is restricted to the supervisor's options. Anything that
//! does not come back as a usable tool call is reported as
//! [`OracleOutcome::Unparseable`] so the supervisor can fall back.

use crate::chat::{ChatMessage, ChatModel, ChatRequest, ToolSpec};
use async_trait::async_trait;
use cohort_core::{DecisionOracle, DecisionRequest, OracleOutcome, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// Name of the forced routing tool
pub const ROUTE_TOOL: &str = "route";

pub struct LlmOracle {
    model: Arc<dyn ChatModel>,
}

impl LlmOracle {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Schema of the `route` tool for the given options
    pub fn route_tool(options: &[String]) -> ToolSpec {
        ToolSpec::new(
            ROUTE_TOOL,
            "Select the next role.",
            json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why this role should act next"
                    },
                    "next": {
                        "type": "string",
                        "enum": options,
                        "description": "The next role to act, or FINISH"
                    },
                    "instructions": {
                        "type": "string",
                        "description": "Specific instructions for the selected role"
                    }
                },
                "required": ["reasoning", "next", "instructions"]
            }),
        )
    }

    pub fn build_request(request: &DecisionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 2);
        messages.push(ChatMessage::system(request.system_prompt()));
        messages.extend(request.messages.iter().map(ChatMessage::from));
        messages.push(ChatMessage::system(request.closing_prompt()));

        ChatRequest::new(messages)
            .with_tools(vec![Self::route_tool(&request.options)])
            .with_tool_choice(ROUTE_TOOL)
    }
}

/// Interpret a model reply: the `route` tool call first, then JSON content.
pub fn interpret(message: &ChatMessage) -> OracleOutcome {
    if let Some(call) = message.tool_calls.iter().find(|c| c.name == ROUTE_TOOL) {
        return match &call.arguments {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => OracleOutcome::from_value(&value),
                Err(e) => OracleOutcome::Unparseable(format!("invalid tool arguments: {e}")),
            },
            value => OracleOutcome::from_value(value),
        };
    }

    match serde_json::from_str::<Value>(message.content.trim()) {
        Ok(value) if value.is_object() => OracleOutcome::from_value(&value),
        _ => OracleOutcome::Unparseable("no route tool call in response".to_string()),
    }
}

#[async_trait]
impl DecisionOracle for LlmOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<OracleOutcome> {
        let response = self.model.chat(Self::build_request(request)).await?;
        let outcome = interpret(&response.message);
        tracing::debug!(model = %self.model.model_name(), ?outcome, "Oracle reply");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatResponse, ToolCall};
    use crate::testing::ScriptedChatModel;
    use cohort_core::{Message, RawDecision};

    fn request() -> DecisionRequest {
        DecisionRequest {
            directive: "Manage Search, WebScraper.".to_string(),
            messages: vec![Message::human("find rust news")],
            options: vec!["FINISH".into(), "Search".into(), "WebScraper".into()],
        }
    }

    fn route_call(arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: ROUTE_TOOL.into(),
            arguments,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let chat = LlmOracle::build_request(&request());
        assert_eq!(chat.messages.len(), 3);
        assert!(chat.messages[0].content.starts_with("Manage Search, WebScraper."));
        assert_eq!(chat.messages[1].content, "find rust news");
        assert!(chat.messages[2]
            .content
            .contains("Select one of FINISH, Search, WebScraper"));
        assert_eq!(chat.tool_choice.as_deref(), Some(ROUTE_TOOL));
        assert_eq!(
            chat.tools[0].parameters["properties"]["next"]["enum"],
            json!(["FINISH", "Search", "WebScraper"])
        );
    }

    #[test]
    fn test_interpret_tool_call() {
        let msg = ChatMessage::assistant("").with_tool_calls(vec![route_call(
            json!({"reasoning": "need data", "next": "Search", "instructions": "look it up"}),
        )]);
        assert_eq!(
            interpret(&msg),
            OracleOutcome::Decision(
                RawDecision::new("Search")
                    .with_reasoning("need data")
                    .with_instructions("look it up")
            )
        );
    }

    #[test]
    fn test_interpret_raw_string_arguments() {
        let msg = ChatMessage::assistant("")
            .with_tool_calls(vec![route_call(json!("{\"next\": \"FINISH\"}"))]);
        assert_eq!(
            interpret(&msg),
            OracleOutcome::Decision(RawDecision::new("FINISH"))
        );

        let broken = ChatMessage::assistant("").with_tool_calls(vec![route_call(json!("{oops"))]);
        assert!(matches!(interpret(&broken), OracleOutcome::Unparseable(_)));
    }

    #[test]
    fn test_interpret_json_content() {
        let msg = ChatMessage::assistant(r#"{"next": "WebScraper"}"#);
        assert_eq!(
            interpret(&msg),
            OracleOutcome::Decision(RawDecision::new("WebScraper"))
        );
    }

    #[test]
    fn test_interpret_prose_is_unparseable() {
        let msg = ChatMessage::assistant("I think Search should go next.");
        assert!(matches!(interpret(&msg), OracleOutcome::Unparseable(_)));
    }

    #[tokio::test]
    async fn test_decide_with_scripted_model() {
        let model = Arc::new(ScriptedChatModel::new(vec![ChatResponse::tool_calls(vec![
            route_call(json!({"next": "FINISH", "reasoning": "done"})),
        ])]));
        let oracle = LlmOracle::new(model.clone());

        let outcome = oracle.decide(&request()).await.unwrap();
        assert_eq!(
            outcome,
            OracleOutcome::Decision(RawDecision::new("FINISH").with_reasoning("done"))
        );
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let oracle = LlmOracle::new(Arc::new(ScriptedChatModel::failing("connection refused")));
        let err = oracle.decide(&request()).await.unwrap_err();
        assert_eq!(err.kind(), cohort_core::ErrorKind::Collaborator);
    }
}
