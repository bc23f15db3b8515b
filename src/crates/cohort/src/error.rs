//! Error types for the cohort application
//!
//! Everything raised by configuration, persistence, tools and notification
//! funnels into [`CohortError`]. Inside graph nodes it converts into
//! [`GraphError::Collaborator`](cohort_core::GraphError) so a failing
//! collaborator aborts the run with a recognizable cause.

use cohort_core::GraphError;
use llm::LlmError;
use thiserror::Error;

/// Result type alias for cohort operations
pub type Result<T> = std::result::Result<T, CohortError>;

#[derive(Debug, Error)]
pub enum CohortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input for {tool}: {message}")]
    InvalidToolInput { tool: String, message: String },

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CohortError {
    pub fn invalid_input(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidToolInput {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Collaborator name reported when this error escapes a graph node
    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Migration(_) | Self::NotFound(_) => "store",
            Self::InvalidToolInput { .. } | Self::ToolExecution(_) => "tool",
            Self::Http(_) => "http",
            Self::Notification(_) => "notifier",
            Self::Llm(_) => "llm",
            Self::Config(_) => "config",
            Self::Graph(_) | Self::Io(_) | Self::Serde(_) => "cohort",
        }
    }
}

impl From<CohortError> for GraphError {
    fn from(err: CohortError) -> Self {
        match err {
            CohortError::Graph(inner) => inner,
            CohortError::Llm(inner) => inner.into(),
            other => GraphError::collaborator(other.collaborator(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::ErrorKind;

    #[test]
    fn test_collaborator_mapping() {
        let err: GraphError = CohortError::NotFound("thread 42".into()).into();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(err.to_string().contains("store"));

        let err: GraphError = CohortError::Notification("relay down".into()).into();
        assert!(err.to_string().contains("notifier"));
    }

    #[test]
    fn test_graph_errors_pass_through() {
        let err: GraphError = CohortError::Graph(GraphError::GraphFrozen).into();
        assert!(matches!(err, GraphError::GraphFrozen));
    }

    #[test]
    fn test_display() {
        let err = CohortError::invalid_input("generate_chart", "no data points");
        assert_eq!(
            err.to_string(),
            "Invalid input for generate_chart: no data points"
        );
    }
}
