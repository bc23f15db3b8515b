//! # cohort - hierarchical agent teams
//!
//! A top-level supervisor routes a user request between three teams, each a
//! supervisor-routed graph of its own:
//!
//! - **ResearchTeam** - `Search` (web search) and `WebScraper` (page scraping)
//! - **DocWritingTeam** - `DocWriter` and `DocUpdater` over the thread's document
//! - **ChartGeneratingTeam** - `ChartGenerator`, then an email notification
//!
//! Documents and charts are persisted per thread in SQLite
//! ([`store::SqliteOutputStore`]); supervisors and capability agents talk to
//! an OpenAI-compatible model through the `llm` crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cohort::store::InMemoryOutputStore;
//! use cohort::notify::LogNotifier;
//! use cohort::teams::{build_top_graph, top_input, Services};
//! use cohort_core::RunContext;
//! use llm::{LlmOracle, OpenAiClient, RemoteLlmConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o")?;
//! let model = Arc::new(OpenAiClient::new(config)?);
//! let services = Services::new(
//!     model.clone(),
//!     Arc::new(LlmOracle::new(model)),
//!     Arc::new(InMemoryOutputStore::new()),
//!     Arc::new(LogNotifier::new()),
//! );
//!
//! let graph = build_top_graph(&services)?;
//! let state = graph
//!     .invoke(top_input("Summarize Rust adoption and chart it"), RunContext::for_thread("12345"))
//!     .await?;
//! println!("{}", state["reasoning"]);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod db;
pub mod notify;
pub mod store;
pub mod teams;
pub mod tools;
pub mod trace;

mod error;

pub use config::{CohortConfig, ConfigLoader};
pub use error::{CohortError, Result};
pub use teams::{Services, Team};

/// Random five-digit thread id, as used for interactive runs
pub fn generate_thread_id() -> String {
    use rand::Rng;
    rand::thread_rng().gen_range(10_000..100_000).to_string()
}
