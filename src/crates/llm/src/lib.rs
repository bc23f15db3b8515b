//! Language-model plumbing for cohort.
//!
//! - [`ChatModel`] is the provider-neutral chat-completion trait, with
//!   function calling ([`ToolSpec`], [`ToolCall`]).
//! - [`OpenAiClient`] speaks the OpenAI chat-completions wire format.
//! - [`LlmOracle`] adapts any [`ChatModel`] into a
//!   [`DecisionOracle`](cohort_core::DecisionOracle) for supervisors.
//!
//! ```rust,ignore
//! use llm::{LlmOracle, OpenAiClient, RemoteLlmConfig};
//! use std::sync::Arc;
//!
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o")?;
//! let oracle = LlmOracle::new(Arc::new(OpenAiClient::new(config)?));
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod oracle;
pub mod remote;
pub mod testing;

pub use chat::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, ToolCall, ToolSpec, Usage};
pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use oracle::{interpret, LlmOracle, ROUTE_TOOL};
pub use remote::OpenAiClient;
