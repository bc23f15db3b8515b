//! Deterministic test doubles
//!
//! [`ScriptedOracle`] replays a fixed list of outcomes so graphs with
//! supervisors can be exercised without a language model.

use crate::error::{GraphError, Result};
use crate::supervisor::{DecisionOracle, DecisionRequest, OracleOutcome, RawDecision};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

enum Script {
    Outcomes(VecDeque<OracleOutcome>, OracleOutcome),
    Fail(String),
}

/// Oracle that returns scripted outcomes in order, repeating the last one
/// once the script runs out.
pub struct ScriptedOracle {
    script: Mutex<Script>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedOracle {
    /// An empty script behaves like [`ScriptedOracle::unparseable`]
    pub fn new(outcomes: Vec<OracleOutcome>) -> Self {
        let last = outcomes
            .last()
            .cloned()
            .unwrap_or_else(|| OracleOutcome::Unparseable("script exhausted".to_string()));
        Self {
            script: Mutex::new(Script::Outcomes(outcomes.into(), last)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always select `next`
    pub fn always(next: &str) -> Self {
        Self::new(vec![OracleOutcome::Decision(RawDecision::new(next))])
    }

    /// Select each name in turn, then keep repeating the last one
    pub fn sequence<I, S>(nexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            nexts
                .into_iter()
                .map(|n| OracleOutcome::Decision(RawDecision::new(n)))
                .collect(),
        )
    }

    pub fn unparseable() -> Self {
        Self::new(vec![OracleOutcome::Unparseable(
            "no tool call in response".to_string(),
        )])
    }

    /// Every call fails as an unreachable collaborator
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Script::Fail(message.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of decisions requested so far
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, request: &DecisionRequest) -> Result<OracleOutcome> {
        self.requests.lock().push(request.clone());
        let mut script = self.script.lock();
        match &mut *script {
            Script::Fail(message) => Err(GraphError::collaborator("oracle", message.clone())),
            Script::Outcomes(queue, last) => Ok(queue.pop_front().unwrap_or_else(|| last.clone())),
        }
    }
}
