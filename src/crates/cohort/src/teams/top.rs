//! Top-level graph: one supervisor routing between the three teams

use super::{chart, document, research, Services, ROUTE_FIELD, SUPERVISOR};
use cohort_core::{
    last_message, project_messages, CompiledGraph, Result, RouteOptions, SchemaField, StateGraph,
    StateSchema, END,
};
use serde_json::json;

pub const NAME: &str = "cohort";

pub fn top_schema() -> StateSchema {
    StateSchema::new()
        .field(SchemaField::append("messages"))
        .field(SchemaField::overriding("next").with_default(json!(research::NAME)))
        .field(
            SchemaField::overriding("instructions")
                .with_default(json!("Resolve the user's request")),
        )
        .field(SchemaField::overriding("reasoning"))
}

pub fn build_top_graph(services: &Services) -> Result<CompiledGraph> {
    let options = RouteOptions::new([research::NAME, document::NAME, chart::NAME]);

    let mut graph = StateGraph::named(NAME, top_schema());
    graph
        .add_node_instance(SUPERVISOR, services.supervisor(&options))?
        .add_subgraph(
            research::NAME,
            research::build_research_team(services)?,
            project_messages(Vec::<String>::new()),
            last_message(),
        )?
        .add_subgraph(
            document::NAME,
            document::build_document_team(services)?,
            document::document_entry(),
            last_message(),
        )?
        .add_subgraph(
            chart::NAME,
            chart::build_chart_team(services)?,
            project_messages(Vec::<String>::new()),
            last_message(),
        )?
        .add_edge(research::NAME, SUPERVISOR)?
        .add_edge(document::NAME, SUPERVISOR)?
        .add_edge(chart::NAME, SUPERVISOR)?
        .add_routing_edges(SUPERVISOR, ROUTE_FIELD, &options, END)?
        .set_entry_point(SUPERVISOR)?
        .set_step_limit(services.step_limit())?;
    graph.compile()
}
