//! DocWritingTeam: write the thread's document once, then refine it

use super::{team_schema, Services, ROUTE_FIELD, SUPERVISOR};
use crate::agent::CapabilityNode;
use crate::tools::{ReadDocumentTool, ToolRegistry, UpdateDocumentTool, WriteDocumentTool};
use cohort_core::subgraph::EntryAdapter;
use cohort_core::{
    project_messages, CompiledGraph, Result, RouteOptions, SchemaField, StateGraph, StateSchema,
    END,
};

pub const NAME: &str = "DocWritingTeam";
pub const DOC_WRITER: &str = "DocWriter";
pub const DOC_UPDATER: &str = "DocUpdater";

/// Thread id of the persisted record the team last read
pub const RECORD_FIELD: &str = "db_id";

/// Roster seeded into `team_members` on entry
pub const TEAM_MEMBERS: [&str; 2] = ["Document Writer", "Document Updater"];

const WRITER_PROMPT: &str =
    "You are an expert writing a research document ONCE using the write_document tool.";
const UPDATER_PROMPT: &str = "As an expert senior researcher, your task is ONLY to read and update \
the existing document if necessary using the read_document and update_document tools.";

pub fn document_schema() -> StateSchema {
    team_schema()
        .field(SchemaField::overriding(RECORD_FIELD))
        .field(SchemaField::accumulate("current_data"))
}

pub fn document_entry() -> EntryAdapter {
    project_messages(TEAM_MEMBERS)
}

pub fn build_document_team(services: &Services) -> Result<CompiledGraph> {
    let options = RouteOptions::new([DOC_WRITER, DOC_UPDATER]);
    let store = services.store.clone();

    let writer = services.agent(
        ToolRegistry::new().with(WriteDocumentTool::new(store.clone(), &services.workdir)),
    );
    let updater = services.agent(
        ToolRegistry::new()
            .with(ReadDocumentTool::new(store.clone()))
            .with(UpdateDocumentTool::new(store.clone(), &services.workdir)),
    );

    let mut graph = StateGraph::named(NAME, document_schema());
    graph
        .add_node_instance(SUPERVISOR, services.supervisor(&options))?
        .add_node_instance(
            DOC_WRITER,
            CapabilityNode::new(DOC_WRITER, WRITER_PROMPT, writer)
                .with_document(store.clone())
                .tracking_record(RECORD_FIELD),
        )?
        .add_node_instance(
            DOC_UPDATER,
            CapabilityNode::new(DOC_UPDATER, UPDATER_PROMPT, updater)
                .with_document(store)
                .tracking_record(RECORD_FIELD),
        )?
        .add_edge(DOC_WRITER, SUPERVISOR)?
        .add_edge(DOC_UPDATER, SUPERVISOR)?
        .add_routing_edges(SUPERVISOR, ROUTE_FIELD, &options, END)?
        .set_entry_point(SUPERVISOR)?
        .set_step_limit(services.step_limit())?;
    graph.compile()
}
