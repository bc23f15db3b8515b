//! Shared setup for integration tests

#![allow(dead_code)]

use cohort::db::Database;
use cohort::notify::LogNotifier;
use cohort::store::{InMemoryOutputStore, SqliteOutputStore};
use cohort::teams::Services;
use cohort_core::testing::ScriptedOracle;
use llm::testing::ScriptedChatModel;
use llm::{ChatResponse, ToolCall};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh migrated database in a temp dir; keep the `TempDir` alive
pub async fn setup_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::initialize(&db_path)
        .await
        .expect("Failed to initialize database");
    (temp_dir, db)
}

pub async fn setup_sqlite_store() -> (TempDir, SqliteOutputStore) {
    let (temp_dir, db) = setup_test_db().await;
    (temp_dir, SqliteOutputStore::new(db))
}

/// Scripted collaborators plus handles for assertions
pub struct Harness {
    pub services: Services,
    pub store: Arc<InMemoryOutputStore>,
    pub notifier: Arc<LogNotifier>,
    pub oracle: Arc<ScriptedOracle>,
    pub model: Arc<ScriptedChatModel>,
    pub workdir: TempDir,
}

pub fn harness(oracle: ScriptedOracle, model: ScriptedChatModel) -> Harness {
    let store = Arc::new(InMemoryOutputStore::new());
    let notifier = Arc::new(LogNotifier::new());
    let oracle = Arc::new(oracle);
    let model = Arc::new(model);
    let workdir = TempDir::new().expect("Failed to create temp dir");

    let services = Services::new(model.clone(), oracle.clone(), store.clone(), notifier.clone())
        .with_workdir(workdir.path());

    Harness {
        services,
        store,
        notifier,
        oracle,
        model,
        workdir,
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ChatResponse {
    ChatResponse::tool_calls(vec![ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }])
}

/// `name` fields of every message in `state`, in order
pub fn authors(state: &Value) -> Vec<String> {
    state["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .map(|m| m["name"].as_str().unwrap_or("").to_string())
                .collect()
        })
        .unwrap_or_default()
}
