//! Document tools over the thread's output record
//!
//! Without a thread id nothing is persisted: writes and updates land in a
//! local `document.md` so team-only runs still leave an artifact, and reads
//! return an empty document.

use super::{parse_input, Tool};
use crate::error::Result;
use crate::store::OutputStore;
use async_trait::async_trait;
use cohort_core::RunContext;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fallback file for runs without a thread id
pub const FALLBACK_DOCUMENT: &str = "document.md";

#[derive(Debug, Deserialize)]
struct ContentInput {
    content: String,
}

fn content_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "The full content of the document."
            }
        },
        "required": ["content"]
    })
}

async fn write_fallback(workdir: &Path, content: &str) -> Result<String> {
    let path = workdir.join(FALLBACK_DOCUMENT);
    tokio::fs::write(&path, content).await?;
    tracing::warn!(path = %path.display(), "No thread id; document kept locally");
    Ok(format!(
        "No thread is active, so the document was not persisted. It was written to {}.",
        path.display()
    ))
}

pub struct WriteDocumentTool {
    store: Arc<dyn OutputStore>,
    workdir: PathBuf,
}

impl WriteDocumentTool {
    pub fn new(store: Arc<dyn OutputStore>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for WriteDocumentTool {
    fn name(&self) -> &str {
        "write_document"
    }

    fn description(&self) -> &str {
        "Create and save the research document."
    }

    fn input_schema(&self) -> Value {
        content_schema()
    }

    async fn execute(&self, input: Value, ctx: &RunContext) -> Result<String> {
        let input: ContentInput = parse_input(self.name(), input)?;
        let Some(thread_id) = ctx.thread_id() else {
            return write_fallback(&self.workdir, &input.content).await;
        };

        self.store.upsert_content(thread_id, &input.content).await?;
        tracing::info!(thread_id, "Document written");
        Ok(format!(
            "The content \"{}\" has been successfully inserted under thread ID {}.",
            input.content, thread_id
        ))
    }
}

pub struct UpdateDocumentTool {
    store: Arc<dyn OutputStore>,
    workdir: PathBuf,
}

impl UpdateDocumentTool {
    pub fn new(store: Arc<dyn OutputStore>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for UpdateDocumentTool {
    fn name(&self) -> &str {
        "update_document"
    }

    fn description(&self) -> &str {
        "Replace the content of the existing document."
    }

    fn input_schema(&self) -> Value {
        content_schema()
    }

    async fn execute(&self, input: Value, ctx: &RunContext) -> Result<String> {
        let input: ContentInput = parse_input(self.name(), input)?;
        let Some(thread_id) = ctx.thread_id() else {
            return write_fallback(&self.workdir, &input.content).await;
        };

        let record = self.store.update_content(thread_id, &input.content).await?;
        tracing::info!(thread_id, "Document updated");
        Ok(format!(
            "The content with thread ID {} has been successfully edited and saved: {}",
            thread_id, record.content
        ))
    }
}

pub struct ReadDocumentTool {
    store: Arc<dyn OutputStore>,
}

impl ReadDocumentTool {
    pub fn new(store: Arc<dyn OutputStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadDocumentTool {
    fn name(&self) -> &str {
        "read_document"
    }

    fn description(&self) -> &str {
        "Read the current document."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, ctx: &RunContext) -> Result<String> {
        let Some(thread_id) = ctx.thread_id() else {
            return Ok(String::new());
        };
        Ok(self
            .store
            .read(thread_id)
            .await?
            .map(|record| record.content)
            .unwrap_or_default())
    }
}
