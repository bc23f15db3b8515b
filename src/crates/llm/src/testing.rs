//! Scripted chat model for tests.

use crate::chat::{ChatModel, ChatRequest, ChatResponse};
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays canned responses in order; the last one repeats once the script
/// runs out.
pub struct ScriptedChatModel {
    responses: Mutex<VecDeque<ChatResponse>>,
    last: Option<ChatResponse>,
    failure: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            last: responses.last().cloned(),
            responses: Mutex::new(responses.into()),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers with plain text
    pub fn replying(text: &str) -> Self {
        Self::new(vec![ChatResponse::text(text)])
    }

    /// Every call fails like an unreachable provider
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: None,
            failure: Some(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(request);
        if let Some(message) = &self.failure {
            return Err(LlmError::ProviderError(message.clone()));
        }
        self.responses
            .lock()
            .pop_front()
            .or_else(|| self.last.clone())
            .ok_or_else(|| LlmError::InvalidResponse("script is empty".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
