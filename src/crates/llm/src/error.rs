//! Error types for language-model clients.

use cohort_core::GraphError;
use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when talking to a chat-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment or configuration.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Provider returned something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider-side failure (5xx and other non-success statuses).
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect(),
            LlmError::RateLimitExceeded(_) | LlmError::ProviderError(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

/// Language-model failures surface in graphs as collaborator errors.
impl From<LlmError> for GraphError {
    fn from(err: LlmError) -> Self {
        GraphError::collaborator("llm", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::ErrorKind;

    #[test]
    fn test_classification() {
        assert!(LlmError::RateLimitExceeded("slow down".into()).is_retryable());
        assert!(!LlmError::AuthenticationError("bad key".into()).is_retryable());
        assert!(LlmError::ApiKeyNotFound("OPENAI_API_KEY".into()).is_auth_error());
    }

    #[test]
    fn test_into_graph_error() {
        let err: GraphError = LlmError::InvalidResponse("empty choices".into()).into();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(err.to_string().contains("empty choices"));
    }
}
