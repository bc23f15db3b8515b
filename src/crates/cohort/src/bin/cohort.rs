//! Cohort CLI - hierarchical research, document and chart teams
//!
//! Main entry point for the cohort command-line tool.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use cohort::db::Database;
use cohort::notify::notifier_from_config;
use cohort::store::{InMemoryOutputStore, OutputStore, SqliteOutputStore};
use cohort::teams::{build_top_graph, top_input, Services, Team};
use cohort::trace::{format_step, format_summary, format_topology};
use cohort::{generate_thread_id, CohortConfig, ConfigLoader};
use cohort_core::{CompiledGraph, RunContext};
use futures::StreamExt;
use llm::{LlmOracle, OpenAiClient, RemoteLlmConfig};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const QUESTION: &str = "Please ask a question that can be documented and plotted.";

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Cohort - hierarchical agent teams for research, documents and charts", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Extra config file layered over the user and project files
    #[arg(short, long, global = true, env = "COHORT_CONFIG")]
    config: Option<PathBuf>,

    /// Step limit per graph run
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the top-level team on one request
    Run {
        /// Request text; read from stdin when absent
        #[arg(short, long)]
        prompt: Option<String>,
        /// Thread id for persisted output; random when absent
        #[arg(short, long)]
        thread_id: Option<String>,
        /// Omit the merged state from each step
        #[arg(long)]
        hide_state: bool,
    },

    /// Run a single team graph directly
    Team {
        team: Team,
        /// Request text
        #[arg(short, long)]
        prompt: String,
        /// Run without a thread id; output goes to local files
        #[arg(long)]
        standalone: bool,
        /// Omit the merged state from each step
        #[arg(long)]
        hide_state: bool,
    },

    /// Print the node and edge listing of every graph
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_override(path);
    }
    let mut config = loader.load().await?;
    if let Some(max_steps) = cli.max_steps {
        config.execution.max_steps = max_steps;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            prompt,
            thread_id,
            hide_state,
        } => {
            let prompt = match prompt {
                Some(prompt) => prompt,
                None => read_prompt()?,
            };
            let services = services(config, false).await?;
            let thread_id = thread_id.unwrap_or_else(generate_thread_id);
            services.store.ensure(&thread_id).await?;
            info!(thread_id = %thread_id, "Starting run");
            println!("Thread ID: {}", thread_id);

            let graph = build_top_graph(&services)?;
            let ctx = RunContext::for_thread(thread_id);
            drive(&graph, top_input(&prompt), ctx, !hide_state).await
        }

        Commands::Team {
            team,
            prompt,
            standalone,
            hide_state,
        } => {
            let services = services(config, false).await?;
            let ctx = if standalone {
                RunContext::standalone()
            } else {
                let thread_id = generate_thread_id();
                services.store.ensure(&thread_id).await?;
                println!("Thread ID: {}", thread_id);
                RunContext::for_thread(thread_id)
            };

            let graph = team.build(&services)?;
            drive(&graph, team.input(&prompt), ctx, !hide_state).await
        }

        Commands::Graph => {
            let services = services(config, true).await?;
            println!("{}", format_topology(&build_top_graph(&services)?));
            for team in [Team::Research, Team::Docs, Team::Chart] {
                println!();
                println!("{}", format_topology(&team.build(&services)?));
            }
            Ok(())
        }
    }
}

/// Collaborators for a run. `offline` skips the api key check and the
/// database, for commands that never reach a model.
async fn services(config: CohortConfig, offline: bool) -> anyhow::Result<Services> {
    let api_key = config.llm.api_key.clone().unwrap_or_default();
    let llm_config = RemoteLlmConfig::new(api_key, &config.llm.base_url, config.llm.model_name())
        .with_temperature(config.llm.temperature)
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .with_max_retries(config.llm.max_retries);
    if !offline {
        llm_config
            .validate()
            .context("Set OPENAI_API_KEY or [llm].api_key")?;
    }
    let model = Arc::new(OpenAiClient::new(llm_config)?);
    let oracle = Arc::new(LlmOracle::new(model.clone()));

    let store: Arc<dyn OutputStore> = if config.database.enabled && !offline {
        let path = config.database_path();
        let db = Database::initialize(&path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        info!(path = %path.display(), "Using SQLite output store");
        Arc::new(SqliteOutputStore::new(db))
    } else {
        Arc::new(InMemoryOutputStore::new())
    };

    let http = reqwest::Client::new();
    let notifier = notifier_from_config(http.clone(), &config.email);

    Ok(Services::new(model, oracle, store, notifier)
        .with_http(http)
        .with_config(config))
}

fn read_prompt() -> anyhow::Result<String> {
    println!("{}", QUESTION);
    print!("> ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let prompt = line.trim().to_string();
    if prompt.is_empty() {
        return Err(anyhow!("No question given"));
    }
    Ok(prompt)
}

async fn drive(
    graph: &CompiledGraph,
    input: Value,
    ctx: RunContext,
    show_state: bool,
) -> anyhow::Result<()> {
    let mut stream = graph.stream(input, ctx);
    let mut last_state = None;

    while let Some(step) = stream.next().await {
        match step {
            Ok(event) => {
                println!("{}", format_step(&event, show_state));
                last_state = Some(event.state);
            }
            Err(e) => {
                error!(graph = %graph.name(), error = %e, "Run aborted");
                return Err(e.into());
            }
        }
    }

    if let Some(state) = last_state {
        print!("{}", format_summary(&state));
    }
    Ok(())
}
