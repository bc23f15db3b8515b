//! `scrape_webpage`: fetch a page and flatten it to text

use super::{parse_input, Tool};
use crate::error::{CohortError, Result};
use async_trait::async_trait;
use cohort_core::RunContext;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;

const NAME: &str = "scrape_webpage";

pub struct ScrapeTool {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ScrapeInput {
    url: String,
}

impl ScrapeTool {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct Patterns {
    title: Regex,
    hidden: Regex,
    block: Regex,
    tag: Regex,
    blank_lines: Regex,
    spaces: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"),
        hidden: Regex::new(r"(?is)<(script|style|noscript|svg|head)\b.*?</(script|style|noscript|svg|head)>|<!--.*?-->")
            .expect("valid regex"),
        block: Regex::new(r"(?i)</?(p|div|br|li|h[1-6]|tr|section|article|header|footer)\b[^>]*>")
            .expect("valid regex"),
        tag: Regex::new(r"(?s)<[^>]+>").expect("valid regex"),
        blank_lines: Regex::new(r"\n\s*\n+").expect("valid regex"),
        spaces: Regex::new(r"[ \t\r\f]+").expect("valid regex"),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Wrap the visible text of `html` as `<Document name="title">…</Document>`
pub fn html_to_document(html: &str) -> String {
    let p = patterns();
    let title = p
        .title
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .unwrap_or_default();

    let body = p.hidden.replace_all(html, " ");
    let body = p.block.replace_all(&body, "\n");
    let body = p.tag.replace_all(&body, " ");
    let body = decode_entities(&body);
    let body = p.spaces.replace_all(&body, " ");
    let joined = body.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    let body = p.blank_lines.replace_all(&joined, "\n\n");

    format!("<Document name=\"{}\">\n{}\n</Document>", title, body.trim())
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Scrape the contents of a webpage"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &RunContext) -> Result<String> {
        let input: ScrapeInput = parse_input(NAME, input)?;
        if !input.url.starts_with("http://") && !input.url.starts_with("https://") {
            return Err(CohortError::invalid_input(NAME, format!("not an http(s) url: {}", input.url)));
        }

        tracing::debug!(url = %input.url, "Scraping page");
        let response = self.client.get(&input.url).send().await?;
        if !response.status().is_success() {
            return Err(CohortError::ToolExecution(format!(
                "{} returned {}",
                input.url,
                response.status()
            )));
        }

        let html = response.text().await?;
        Ok(html_to_document(&html))
    }
}
