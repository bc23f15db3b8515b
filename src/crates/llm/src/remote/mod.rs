//! Remote LLM providers.
//!
//! Only the OpenAI chat-completions wire format is implemented. Any service
//! speaking it (OpenAI, Azure deployments behind a gateway, LM Studio,
//! OpenRouter, vLLM) works by pointing `base_url` at it.

pub mod openai;

pub use openai::OpenAiClient;
