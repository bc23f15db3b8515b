//! `web_search`: up-to-date results from the Tavily search API

use super::{parse_input, Tool};
use crate::config::SearchConfig;
use crate::error::{CohortError, Result};
use async_trait::async_trait;
use cohort_core::RunContext;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const NAME: &str = "web_search";

pub struct WebSearchTool {
    client: Client,
    config: SearchConfig,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl WebSearchTool {
    pub fn new(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }
}

/// One block per result, separated by blank lines
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }
    results
        .iter()
        .map(|r| format!("Title: {}\nURL: {}\n{}", r.title, r.url, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information. Returns titles, URLs and content snippets."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &RunContext) -> Result<String> {
        let input: SearchInput = parse_input(NAME, input)?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CohortError::Config("TAVILY_API_KEY is not set".to_string()))?;

        tracing::debug!(query = %input.query, "Web search");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&TavilyRequest {
                api_key,
                query: &input.query,
                max_results: self.config.max_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CohortError::ToolExecution(format!(
                "search API returned {}: {}",
                status, body
            )));
        }

        let parsed: TavilyResponse = response.json().await?;
        Ok(format_results(&parsed.results))
    }
}
