//! Configuration schema for cohort

use cohort_core::supervisor::DEFAULT_MAX_VISITS;
use cohort_core::DEFAULT_STEP_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main cohort configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CohortConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat-completions endpoint used by supervisors and capability agents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL of an OpenAI-compatible service
    pub base_url: String,

    /// Model name; falls back to `OPENAI_MODEL_NAME`, then `gpt-4o`
    pub model: Option<String>,

    /// API key (supports `${VAR}`); falls back to `OPENAI_API_KEY`
    pub api_key: Option<String>,

    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: None,
            api_key: None,
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("gpt-4o")
    }
}

/// Run bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Step limit applied to every graph run, nested teams included
    pub max_steps: usize,

    /// How often one supervisor may select the same delegate per run
    pub max_visits: u32,

    /// Model/tool rounds a capability agent may take before answering
    pub agent_max_iterations: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_STEP_LIMIT,
            max_visits: DEFAULT_MAX_VISITS,
            agent_max_iterations: 6,
        }
    }
}

/// Output store location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (relative to ~/.cohort or absolute)
    pub path: String,

    /// Use SQLite; when false outputs only live for the process lifetime
    pub enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "cohort.db".to_string(),
            enabled: true,
        }
    }
}

/// Web search (Tavily)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,

    /// Falls back to `TAVILY_API_KEY`
    pub api_key: Option<String>,

    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com/search".to_string(),
            api_key: None,
            max_results: 5,
        }
    }
}

/// Mail relay used by the notification step
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    /// HTTP mail API; falls back to `MAIL_API_URL`. Unset means log only.
    pub endpoint: Option<String>,

    /// Falls back to `MAIL_API_KEY`
    pub api_key: Option<String>,

    /// Falls back to `EMAIL_USER_FROM`
    pub from: Option<String>,

    /// Falls back to `EMAIL_USER_TO`
    pub to: Option<String>,

    /// Falls back to `EMAIL_SUBJECT`
    pub subject: Option<String>,
}

impl EmailConfig {
    pub fn subject_line(&self) -> &str {
        self.subject.as_deref().unwrap_or("Research report")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CohortConfig {
    /// Expand `${VAR}` references in string values
    pub fn resolve_env_vars(&mut self) {
        for slot in [
            &mut self.llm.api_key,
            &mut self.llm.model,
            &mut self.search.api_key,
            &mut self.email.endpoint,
            &mut self.email.api_key,
            &mut self.email.from,
            &mut self.email.to,
            &mut self.email.subject,
        ] {
            if let Some(value) = slot.as_mut() {
                *value = expand_env_var(value);
            }
        }
        self.llm.base_url = expand_env_var(&self.llm.base_url);
    }

    /// Fill unset secrets and addresses from the conventional variables
    pub fn apply_env_fallbacks(&mut self) {
        fill_from_env(&mut self.llm.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.llm.model, "OPENAI_MODEL_NAME");
        fill_from_env(&mut self.search.api_key, "TAVILY_API_KEY");
        fill_from_env(&mut self.email.endpoint, "MAIL_API_URL");
        fill_from_env(&mut self.email.api_key, "MAIL_API_KEY");
        fill_from_env(&mut self.email.from, "EMAIL_USER_FROM");
        fill_from_env(&mut self.email.to, "EMAIL_USER_TO");
        fill_from_env(&mut self.email.subject, "EMAIL_SUBJECT");
    }

    /// If path is relative, resolves it relative to ~/.cohort
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);
        if path.is_absolute() {
            path
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cohort")
                .join(path)
        }
    }
}

/// `${NAME}` becomes the variable's value; unknown variables stay as written
pub fn expand_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    let unset = slot.as_deref().map_or(true, str::is_empty);
    if unset {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
    }
}
