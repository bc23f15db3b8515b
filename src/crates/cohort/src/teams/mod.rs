//! Agent teams
//!
//! Every team is a compiled graph with a `supervisor` entry node, capability
//! nodes that report back to it, and routing edges driven by the `next`
//! field. The top-level graph treats each team as one step through a
//! subgraph adapter.
//!
//! ```text
//!                    supervisor ──FINISH──▶ END
//!        ┌──────────────┼──────────────┐
//!  ResearchTeam   DocWritingTeam   ChartGeneratingTeam
//! ```

pub mod chart;
pub mod document;
pub mod research;
pub mod top;

pub use chart::build_chart_team;
pub use document::build_document_team;
pub use research::build_research_team;
pub use top::build_top_graph;

use crate::agent::ToolAgent;
use crate::config::CohortConfig;
use crate::notify::Notifier;
use crate::store::OutputStore;
use crate::tools::ToolRegistry;
use cohort_core::{
    CompiledGraph, DecisionOracle, Message, Result, RouteOptions, SchemaField, StateSchema,
    Supervisor,
};
use llm::ChatModel;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Node name of every team's router
pub const SUPERVISOR: &str = "supervisor";

/// State field the routing edges read
pub const ROUTE_FIELD: &str = "next";

pub const SUPERVISOR_DIRECTIVE: &str = "You are a supervisor tasked with managing a conversation \
between the following workers: {team_members}. Given the following user request, respond with the \
worker to act next. Each worker will perform a task and respond with their results and status. \
When finished, respond with FINISH.\n\nSelect strategically to minimize the number of steps taken.";

/// Collaborators and settings shared by every team
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn ChatModel>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub store: Arc<dyn OutputStore>,
    pub notifier: Arc<dyn Notifier>,
    pub http: Client,
    pub config: CohortConfig,
    /// Directory for local fallback files (`document.md`, `chart.svg`)
    pub workdir: PathBuf,
}

impl Services {
    pub fn new(
        model: Arc<dyn ChatModel>,
        oracle: Arc<dyn DecisionOracle>,
        store: Arc<dyn OutputStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            model,
            oracle,
            store,
            notifier,
            http: Client::new(),
            config: CohortConfig::default(),
            workdir: PathBuf::from("."),
        }
    }

    pub fn with_config(mut self, config: CohortConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// A fresh supervisor over `options`; each call gets its own visit counters
    pub fn supervisor(&self, options: &RouteOptions) -> Supervisor {
        Supervisor::new(
            SUPERVISOR,
            SUPERVISOR_DIRECTIVE,
            options.clone(),
            self.oracle.clone(),
        )
        .with_max_visits(self.config.execution.max_visits)
    }

    pub fn agent(&self, tools: ToolRegistry) -> ToolAgent {
        ToolAgent::new(self.model.clone(), tools)
            .with_max_iterations(self.config.execution.agent_max_iterations)
    }

    pub fn step_limit(&self) -> usize {
        self.config.execution.max_steps
    }
}

/// Fields every team carries
pub fn team_schema() -> StateSchema {
    StateSchema::new()
        .field(SchemaField::append("messages"))
        .field(SchemaField::append("team_members"))
        .field(SchemaField::overriding("next").with_default(json!(SUPERVISOR)))
        .field(
            SchemaField::overriding("instructions")
                .with_default(json!("Solve the human's questions")),
        )
        .field(SchemaField::overriding("reasoning"))
}

/// Graphs runnable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Team {
    Research,
    Docs,
    Chart,
}

impl Team {
    pub fn build(self, services: &Services) -> Result<CompiledGraph> {
        match self {
            Team::Research => build_research_team(services),
            Team::Docs => build_document_team(services),
            Team::Chart => build_chart_team(services),
        }
    }

    /// Input for a direct run, shaped like the top-level entry adapter's output
    pub fn input(self, prompt: &str) -> Value {
        let messages = json!([Message::human(prompt).to_value()]);
        match self {
            Team::Docs => json!({
                "messages": messages,
                "team_members": document::TEAM_MEMBERS,
            }),
            Team::Research | Team::Chart => json!({ "messages": messages }),
        }
    }
}

/// Input for a top-level run
pub fn top_input(prompt: &str) -> Value {
    json!({ "messages": [Message::human(prompt).to_value()] })
}
