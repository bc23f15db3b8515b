//! ResearchTeam: web search and page scraping

use super::{team_schema, Services, ROUTE_FIELD, SUPERVISOR};
use crate::agent::CapabilityNode;
use crate::tools::{ScrapeTool, ToolRegistry, WebSearchTool};
use cohort_core::{CompiledGraph, Result, RouteOptions, StateGraph, StateSchema, END};

pub const NAME: &str = "ResearchTeam";
pub const SEARCH: &str = "Search";
pub const WEB_SCRAPER: &str = "WebScraper";

const SEARCH_PROMPT: &str =
    "You are a research assistant who can search for up-to-date info using the web_search tool.";
const SCRAPE_PROMPT: &str = "You are a research assistant who can scrape specified urls for more \
detailed information using the scrape_webpage tool.";

pub fn research_schema() -> StateSchema {
    team_schema()
}

pub fn build_research_team(services: &Services) -> Result<CompiledGraph> {
    let options = RouteOptions::new([SEARCH, WEB_SCRAPER]);

    let search = services.agent(ToolRegistry::new().with(WebSearchTool::new(
        services.http.clone(),
        services.config.search.clone(),
    )));
    let scrape = services.agent(ToolRegistry::new().with(ScrapeTool::new(services.http.clone())));

    let mut graph = StateGraph::named(NAME, research_schema());
    graph
        .add_node_instance(SUPERVISOR, services.supervisor(&options))?
        .add_node_instance(SEARCH, CapabilityNode::new(SEARCH, SEARCH_PROMPT, search))?
        .add_node_instance(WEB_SCRAPER, CapabilityNode::new(WEB_SCRAPER, SCRAPE_PROMPT, scrape))?
        .add_edge(SEARCH, SUPERVISOR)?
        .add_edge(WEB_SCRAPER, SUPERVISOR)?
        .add_routing_edges(SUPERVISOR, ROUTE_FIELD, &options, END)?
        .set_entry_point(SUPERVISOR)?
        .set_step_limit(services.step_limit())?;
    graph.compile()
}
