//! ChartGeneratingTeam: render a chart, then send the email notification

use super::{team_schema, Services, ROUTE_FIELD, SUPERVISOR};
use crate::agent::CapabilityNode;
use crate::notify::EmailNotificationNode;
use crate::tools::{ChartTool, ToolRegistry};
use cohort_core::{CompiledGraph, Result, RouteOptions, SchemaField, StateGraph, StateSchema, END};

pub const NAME: &str = "ChartGeneratingTeam";
pub const CHART_GENERATOR: &str = "ChartGenerator";
pub const EMAIL_NOTIFICATION: &str = "EmailNotification";

const CHART_PROMPT: &str = "You are a data visualization expert tasked with generating charts for \
a research project using the generate_chart tool.";

pub fn chart_schema() -> StateSchema {
    team_schema().field(SchemaField::accumulate("current_data"))
}

pub fn build_chart_team(services: &Services) -> Result<CompiledGraph> {
    let options = RouteOptions::new([CHART_GENERATOR]);

    let generator = services.agent(
        ToolRegistry::new().with(ChartTool::new(services.store.clone(), &services.workdir)),
    );
    let email = EmailNotificationNode::new(
        services.store.clone(),
        services.notifier.clone(),
        services.config.email.clone(),
    );

    let mut graph = StateGraph::named(NAME, chart_schema());
    graph
        .add_node_instance(SUPERVISOR, services.supervisor(&options))?
        .add_node_instance(
            CHART_GENERATOR,
            CapabilityNode::new(CHART_GENERATOR, CHART_PROMPT, generator)
                .with_document(services.store.clone()),
        )?
        .add_node_instance(EMAIL_NOTIFICATION, email)?
        .add_edge(CHART_GENERATOR, SUPERVISOR)?
        .add_routing_edges(SUPERVISOR, ROUTE_FIELD, &options, EMAIL_NOTIFICATION)?
        .add_edge(EMAIL_NOTIFICATION, END)?
        .set_entry_point(SUPERVISOR)?
        .set_step_limit(services.step_limit())?;
    graph.compile()
}
