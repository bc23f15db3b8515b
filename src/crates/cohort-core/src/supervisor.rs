//! Supervisor routing
//!
//! A [`Supervisor`] is a node that asks a [`DecisionOracle`] which of its
//! delegates should act next, then writes the answer into the `next`,
//! `reasoning` and `instructions` fields of run state. A conditional edge
//! built with [`StateGraph::add_routing_edges`](crate::StateGraph::add_routing_edges)
//! turns `next` into the actual transition.
//!
//! # Fail-open parsing
//!
//! The oracle reports [`OracleOutcome::Unparseable`] when it cannot produce a
//! structured decision. A decision naming something outside the option set is
//! treated the same way. In both cases the supervisor selects its first
//! declared delegate with empty instructions instead of failing the run.
//!
//! # Loop prevention
//!
//! Every delegate selection increments a [`VisitCounter`] owned by the
//! current run (see [`RunScope`](crate::RunScope)). When the post-increment
//! count for a delegate exceeds the visit limit (3 by default) the decision is
//! replaced by `FINISH` with reasoning [`FORCED_FINISH_REASONING`] and empty
//! instructions. `FINISH` selections are never counted. Nested supervisors
//! run in their own child runs and therefore keep independent counters.
//!
//! ```rust
//! use cohort_core::supervisor::{RoutingDecision, VisitCounter};
//! use cohort_core::{Route, RouteOptions, Supervisor};
//! use cohort_core::testing::ScriptedOracle;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let supervisor = Supervisor::new(
//!     "supervisor",
//!     "Manage the workers: {team_members}.",
//!     RouteOptions::new(["Search"]),
//!     Arc::new(ScriptedOracle::always("Search")),
//! );
//!
//! let mut visits = VisitCounter::new();
//! for _ in 0..3 {
//!     let d = supervisor.route(&[], &mut visits).await.unwrap();
//!     assert_eq!(d.next, Route::Delegate("Search".into()));
//! }
//! let forced = supervisor.route(&[], &mut visits).await.unwrap();
//! assert_eq!(forced, RoutingDecision::forced_finish());
//! # });
//! ```

use crate::context::RunContext;
use crate::error::Result;
use crate::graph::Node;
use crate::messages::{self, Message};
use crate::routing::{Route, RouteOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Reasoning recorded when loop prevention overrides the oracle
pub const FORCED_FINISH_REASONING: &str = "terminated to prevent repeated delegation";

/// Default number of times one delegate may be selected in a run
pub const DEFAULT_MAX_VISITS: u32 = 3;

const WORKFLOW_GUIDELINES: &str = "\
IMPORTANT WORKFLOW GUIDELINES:
1. Every step must move the task closer to completion
2. Do not hand the same worker the same job again and again
3. Select FINISH once the request is satisfied or no further progress is possible
4. Select FINISH after at most 10 workflow steps
5. The usual order is research, then document processing, then chart generation and email";

/// Per-run selection counts for one supervisor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitCounter {
    counts: HashMap<String, u32>,
}

impl VisitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `name` and return the new count
    pub fn record(&mut self, name: &str) -> u32 {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

/// Everything the oracle sees when asked to route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRequest {
    /// Supervisor directive with `{team_members}` already substituted
    pub directive: String,
    pub messages: Vec<Message>,
    /// Option names, `FINISH` first
    pub options: Vec<String>,
}

impl DecisionRequest {
    /// Opening system prompt: directive plus workflow guidelines
    pub fn system_prompt(&self) -> String {
        format!("{}\n\n{}\n", self.directive, WORKFLOW_GUIDELINES)
    }

    /// Closing system prompt listing the options
    pub fn closing_prompt(&self) -> String {
        format!(
            "Given the conversation above, who should act next? Or should we FINISH? \
             Select one of {}. Remember to FINISH once the task is complete or after 10 steps maximum.",
            self.options.join(", ")
        )
    }
}

/// Structured decision as produced by an oracle, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub reasoning: String,
    pub next: String,
    #[serde(default)]
    pub instructions: String,
}

impl RawDecision {
    pub fn new(next: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            next: next.into(),
            instructions: String::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }
}

/// What an oracle returns: a decision, or an explicit "could not parse"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleOutcome {
    Decision(RawDecision),
    Unparseable(String),
}

impl OracleOutcome {
    /// Interpret JSON tool arguments; anything without a string `next` is unparseable
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<RawDecision>(value.clone()) {
            Ok(decision) => OracleOutcome::Decision(decision),
            Err(e) => OracleOutcome::Unparseable(e.to_string()),
        }
    }
}

/// The external decision maker, typically a language model.
///
/// Transport failures are errors; malformed answers are
/// [`OracleOutcome::Unparseable`].
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<OracleOutcome>;
}

/// A validated routing decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub reasoning: String,
    pub next: Route,
    pub instructions: String,
}

impl RoutingDecision {
    pub fn forced_finish() -> Self {
        Self {
            reasoning: FORCED_FINISH_REASONING.to_string(),
            next: Route::Finish,
            instructions: String::new(),
        }
    }

    /// Partial state update carrying this decision
    pub fn to_update(&self) -> Value {
        json!({
            "next": self.next.as_str(),
            "reasoning": self.reasoning,
            "instructions": self.instructions,
        })
    }
}

pub struct Supervisor {
    id: Uuid,
    name: String,
    directive: String,
    options: RouteOptions,
    oracle: Arc<dyn DecisionOracle>,
    max_visits: u32,
}

impl Supervisor {
    /// `directive` may contain `{team_members}`, replaced with the delegate list.
    pub fn new(
        name: impl Into<String>,
        directive: impl Into<String>,
        options: RouteOptions,
        oracle: Arc<dyn DecisionOracle>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            directive: directive.into(),
            options,
            oracle,
            max_visits: DEFAULT_MAX_VISITS,
        }
    }

    pub fn with_max_visits(mut self, max_visits: u32) -> Self {
        self.max_visits = max_visits;
        self
    }

    /// Key of this supervisor's counter inside a [`RunScope`](crate::RunScope)
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn max_visits(&self) -> u32 {
        self.max_visits
    }

    pub fn request(&self, history: &[Message]) -> DecisionRequest {
        DecisionRequest {
            directive: self
                .directive
                .replace("{team_members}", &self.options.delegates().join(", ")),
            messages: history.to_vec(),
            options: self.options.names(),
        }
    }

    /// Ask the oracle and validate its answer, falling back to the first delegate.
    pub async fn propose(&self, history: &[Message]) -> Result<RoutingDecision> {
        let request = self.request(history);
        let outcome = self.oracle.decide(&request).await?;

        let decision = match outcome {
            OracleOutcome::Decision(raw) => match self.options.parse(&raw.next) {
                Some(next) => RoutingDecision {
                    reasoning: raw.reasoning,
                    next,
                    instructions: raw.instructions,
                },
                None => self.fallback(&format!("'{}' is not an option", raw.next)),
            },
            OracleOutcome::Unparseable(reason) => self.fallback(&reason),
        };
        Ok(decision)
    }

    fn fallback(&self, reason: &str) -> RoutingDecision {
        let next = match self.options.first_delegate() {
            Some(first) => Route::Delegate(first.to_string()),
            None => Route::Finish,
        };
        tracing::warn!(
            supervisor = %self.name,
            reason = %reason,
            fallback = %next,
            "Unparseable routing decision"
        );
        RoutingDecision {
            reasoning: format!("no usable decision ({reason}); defaulting to {next}"),
            next,
            instructions: String::new(),
        }
    }

    /// Count the selection and override it once the visit limit is exceeded.
    pub fn guard(&self, decision: RoutingDecision, visits: &mut VisitCounter) -> RoutingDecision {
        let Route::Delegate(name) = &decision.next else {
            return decision;
        };
        // Past the limit the delegate stays forced without counting again.
        if visits.count(name) > self.max_visits {
            return RoutingDecision::forced_finish();
        }
        let count = visits.record(name);
        if count > self.max_visits {
            tracing::warn!(
                supervisor = %self.name,
                delegate = %name,
                count,
                "Forcing FINISH after repeated delegation"
            );
            return RoutingDecision::forced_finish();
        }
        decision
    }

    /// [`propose`](Self::propose) then [`guard`](Self::guard) against `visits`
    pub async fn route(
        &self,
        history: &[Message],
        visits: &mut VisitCounter,
    ) -> Result<RoutingDecision> {
        let decision = self.propose(history).await?;
        Ok(self.guard(decision, visits))
    }
}

#[async_trait]
impl Node for Supervisor {
    async fn invoke(&self, state: Value, ctx: &RunContext) -> Result<Value> {
        let history = messages::history(&state);
        let proposed = self.propose(&history).await?;
        let decision = ctx
            .scope()
            .with_visits(self.id, |visits| self.guard(proposed, visits));

        tracing::info!(
            supervisor = %self.name,
            next = %decision.next,
            instructions = %decision.instructions,
            "Routing decision"
        );
        Ok(decision.to_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::testing::ScriptedOracle;

    fn supervisor(oracle: ScriptedOracle) -> Supervisor {
        Supervisor::new(
            "supervisor",
            "Workers: {team_members}.",
            RouteOptions::new(["Search", "WebScraper"]),
            Arc::new(oracle),
        )
    }

    #[test]
    fn test_visit_counter() {
        let mut visits = VisitCounter::new();
        assert_eq!(visits.record("a"), 1);
        assert_eq!(visits.record("a"), 2);
        assert_eq!(visits.record("b"), 1);
        assert_eq!(visits.count("a"), 2);
        assert_eq!(visits.count("zzz"), 0);
        assert_eq!(visits.total(), 3);
    }

    #[test]
    fn test_request_rendering() {
        let sup = supervisor(ScriptedOracle::always("FINISH"));
        let request = sup.request(&[Message::human("hi")]);
        assert_eq!(request.directive, "Workers: Search, WebScraper.");
        assert_eq!(request.options, vec!["FINISH", "Search", "WebScraper"]);
        assert!(request.system_prompt().contains("WORKFLOW GUIDELINES"));
        assert!(request
            .closing_prompt()
            .contains("Select one of FINISH, Search, WebScraper."));
    }

    #[tokio::test]
    async fn test_valid_decision_passes_through() {
        let oracle = ScriptedOracle::new(vec![OracleOutcome::Decision(
            RawDecision::new("WebScraper")
                .with_reasoning("need the page")
                .with_instructions("fetch it"),
        )]);
        let sup = supervisor(oracle);
        let mut visits = VisitCounter::new();
        let decision = sup.route(&[], &mut visits).await.unwrap();
        assert_eq!(decision.next, Route::Delegate("WebScraper".into()));
        assert_eq!(decision.instructions, "fetch it");
        assert_eq!(visits.count("WebScraper"), 1);
    }

    #[tokio::test]
    async fn test_unparseable_falls_back_to_first_delegate() {
        let sup = supervisor(ScriptedOracle::unparseable());
        let mut visits = VisitCounter::new();
        let decision = sup.route(&[], &mut visits).await.unwrap();
        assert_eq!(decision.next, Route::Delegate("Search".into()));
        assert_eq!(decision.instructions, "");
        assert_eq!(visits.count("Search"), 1);
    }

    #[tokio::test]
    async fn test_unknown_option_treated_as_unparseable() {
        let sup = supervisor(ScriptedOracle::always("Painter"));
        let decision = sup.propose(&[]).await.unwrap();
        assert_eq!(decision.next, Route::Delegate("Search".into()));
    }

    #[tokio::test]
    async fn test_fallback_without_delegates_finishes() {
        let sup = Supervisor::new(
            "lonely",
            "",
            RouteOptions::new(Vec::<String>::new()),
            Arc::new(ScriptedOracle::unparseable()),
        );
        assert_eq!(sup.propose(&[]).await.unwrap().next, Route::Finish);
    }

    #[tokio::test]
    async fn test_fourth_selection_is_forced_to_finish() {
        let sup = supervisor(ScriptedOracle::always("Search"));
        let mut visits = VisitCounter::new();
        for _ in 0..3 {
            let d = sup.route(&[], &mut visits).await.unwrap();
            assert_eq!(d.next, Route::Delegate("Search".into()));
        }
        let forced = sup.route(&[], &mut visits).await.unwrap();
        assert_eq!(forced.next, Route::Finish);
        assert_eq!(forced.reasoning, FORCED_FINISH_REASONING);
        assert_eq!(forced.instructions, "");
    }

    #[tokio::test]
    async fn test_forced_delegate_is_not_counted_again() {
        let sup = supervisor(ScriptedOracle::always("Search"));
        let mut visits = VisitCounter::new();
        for _ in 0..6 {
            sup.route(&[], &mut visits).await.unwrap();
        }
        assert_eq!(visits.count("Search"), 4);

        let still_forced = sup.route(&[], &mut visits).await.unwrap();
        assert_eq!(still_forced.next, Route::Finish);
        assert_eq!(still_forced.reasoning, FORCED_FINISH_REASONING);
        assert_eq!(visits.count("Search"), 4);
    }

    #[tokio::test]
    async fn test_finish_is_not_counted() {
        let sup = supervisor(ScriptedOracle::always("FINISH"));
        let mut visits = VisitCounter::new();
        for _ in 0..5 {
            let d = sup.route(&[], &mut visits).await.unwrap();
            assert_eq!(d.next, Route::Finish);
            assert_eq!(d.reasoning, "");
        }
        assert_eq!(visits.total(), 0);
    }

    #[tokio::test]
    async fn test_custom_visit_limit() {
        let sup = supervisor(ScriptedOracle::always("Search")).with_max_visits(1);
        let mut visits = VisitCounter::new();
        assert!(!sup.route(&[], &mut visits).await.unwrap().next.is_finish());
        assert!(sup.route(&[], &mut visits).await.unwrap().next.is_finish());
    }

    #[tokio::test]
    async fn test_node_writes_routing_fields() {
        let sup = supervisor(ScriptedOracle::new(vec![OracleOutcome::Decision(
            RawDecision::new("Search").with_instructions("look it up"),
        )]));
        let ctx = RunContext::standalone();
        let update = sup
            .invoke(serde_json::json!({"messages": []}), &ctx)
            .await
            .unwrap();
        assert_eq!(update["next"], "Search");
        assert_eq!(update["instructions"], "look it up");
        assert_eq!(ctx.scope().visits(sup.id()).count("Search"), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_propagates() {
        let sup = supervisor(ScriptedOracle::failing("connection refused"));
        let err = sup.propose(&[]).await.unwrap_err();
        assert!(matches!(err, GraphError::Collaborator { .. }));
    }

    #[test]
    fn test_outcome_from_value() {
        let ok = OracleOutcome::from_value(&json!({"next": "Search", "reasoning": "r"}));
        assert_eq!(
            ok,
            OracleOutcome::Decision(RawDecision::new("Search").with_reasoning("r"))
        );
        assert!(matches!(
            OracleOutcome::from_value(&json!({"reasoning": "no next"})),
            OracleOutcome::Unparseable(_)
        ));
    }
}
