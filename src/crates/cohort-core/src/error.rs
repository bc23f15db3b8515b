//! Error types for graph construction and execution
//!
//! Every fallible operation in this crate returns [`GraphError`]. The variants
//! fall into a small taxonomy exposed through [`GraphError::kind`]:
//!
//! ```text
//! GraphError
//! ├── Construction   DuplicateNode, UnknownNode, UnresolvedEdgeTarget,
//! │                  GraphFrozen, ReservedName, DuplicateEdge, MissingEntryPoint
//! ├── Routing        NoMatchingBranch, NoOutgoingEdge
//! ├── StepLimit      StepLimitExceeded
//! ├── State          State, StateUpdate, Serialization
//! ├── Node           NodeExecution
//! └── Collaborator   Collaborator (oracle, persistence, notification, ...)
//! ```
//!
//! Construction errors are raised by [`StateGraph`](crate::StateGraph) while a
//! graph is being assembled and are never retried. Routing and step-limit
//! errors abort a run. Collaborator errors come from nodes that talk to the
//! outside world and propagate unchanged through the engine; the engine itself
//! never retries.
//!
//! # Matching on errors
//!
//! ```rust
//! use cohort_core::{GraphError, ErrorKind};
//!
//! fn report(err: &GraphError) -> String {
//!     match err.kind() {
//!         ErrorKind::Construction => format!("graph definition is invalid: {err}"),
//!         ErrorKind::StepLimit => format!("run did not converge: {err}"),
//!         kind => format!("{kind}: {err}"),
//!     }
//! }
//!
//! let err = GraphError::StepLimitExceeded { limit: 25 };
//! assert!(report(&err).starts_with("run did not converge"));
//! ```

use crate::state::StateError;
use std::fmt;
use thiserror::Error;

/// A static or conditional edge whose destination names no registered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    /// Node the edge leaves from
    pub source: String,
    /// Destination that failed to resolve
    pub target: String,
}

impl fmt::Display for DanglingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

fn join_edges(edges: &[DanglingEdge]) -> String {
    edges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The graph definition itself is invalid
    Construction,
    /// A transition could not be resolved at runtime
    Routing,
    /// The run exceeded its step bound
    StepLimit,
    /// State shape or reducer failure
    State,
    /// A node handler failed
    Node,
    /// An external collaborator (oracle, storage, mail, ...) failed
    Collaborator,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Construction => "construction",
            ErrorKind::Routing => "routing",
            ErrorKind::StepLimit => "step_limit",
            ErrorKind::State => "state",
            ErrorKind::Node => "node",
            ErrorKind::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building or running a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node with this name is already registered
    #[error("Node '{0}' is already registered")]
    DuplicateNode(String),

    /// An operation referenced a node that is not registered
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// One or more edges point at nodes that were never registered
    #[error("Unresolved edge targets: {}", join_edges(.edges))]
    UnresolvedEdgeTarget { edges: Vec<DanglingEdge> },

    /// The builder was already compiled and can no longer be changed
    #[error("Graph is frozen; it was already compiled")]
    GraphFrozen,

    /// `__start__` and `__end__` cannot be used as node names
    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    /// A node may carry at most one edge of each kind
    #[error("Node '{node}' already has a {kind} edge")]
    DuplicateEdge { node: String, kind: &'static str },

    /// `compile()` was called before an entry point was set
    #[error("No entry point set")]
    MissingEntryPoint,

    /// A conditional edge's selector produced a key with no mapped destination
    #[error("No branch of node '{node}' matches '{key}'")]
    NoMatchingBranch { node: String, key: String },

    /// A node finished without a static or conditional edge to follow
    #[error("Node '{0}' has no outgoing edge")]
    NoOutgoingEdge(String),

    /// The run took more steps than its configured bound
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// Initial state or reducer failure
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// A node returned an update the schema rejected
    #[error("Update from node '{node}' rejected: {source}")]
    StateUpdate {
        node: String,
        #[source]
        source: StateError,
    },

    /// A node handler failed
    #[error("Node '{node}' failed: {error}")]
    NodeExecution { node: String, error: String },

    /// An external collaborator failed
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a node execution error
    pub fn node_execution(node: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }

    /// Create a collaborator error
    pub fn collaborator(collaborator: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::DuplicateNode(_)
            | GraphError::UnknownNode(_)
            | GraphError::UnresolvedEdgeTarget { .. }
            | GraphError::GraphFrozen
            | GraphError::ReservedName(_)
            | GraphError::DuplicateEdge { .. }
            | GraphError::MissingEntryPoint => ErrorKind::Construction,
            GraphError::NoMatchingBranch { .. } | GraphError::NoOutgoingEdge(_) => {
                ErrorKind::Routing
            }
            GraphError::StepLimitExceeded { .. } => ErrorKind::StepLimit,
            GraphError::State(_) | GraphError::StateUpdate { .. } | GraphError::Serialization(_) => {
                ErrorKind::State
            }
            GraphError::NodeExecution { .. } => ErrorKind::Node,
            GraphError::Collaborator { .. } => ErrorKind::Collaborator,
        }
    }

    /// Whether this error came from assembling the graph rather than running it
    pub fn is_construction(&self) -> bool {
        self.kind() == ErrorKind::Construction
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_targets_lists_every_edge() {
        let err = GraphError::UnresolvedEdgeTarget {
            edges: vec![
                DanglingEdge {
                    source: "a".into(),
                    target: "missing".into(),
                },
                DanglingEdge {
                    source: "b".into(),
                    target: "gone".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Unresolved edge targets: a -> missing, b -> gone"
        );
        assert!(err.is_construction());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(GraphError::GraphFrozen.kind(), ErrorKind::Construction);
        assert_eq!(
            GraphError::NoOutgoingEdge("x".into()).kind(),
            ErrorKind::Routing
        );
        assert_eq!(
            GraphError::StepLimitExceeded { limit: 3 }.kind(),
            ErrorKind::StepLimit
        );
        assert_eq!(
            GraphError::collaborator("oracle", "timeout").kind(),
            ErrorKind::Collaborator
        );
        assert_eq!(
            GraphError::node_execution("n", "boom").to_string(),
            "Node 'n' failed: boom"
        );
    }
}
