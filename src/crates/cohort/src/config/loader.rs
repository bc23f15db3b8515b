//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.cohort/cohort.toml
//! 3. Project-level config: ./.cohort/cohort.toml
//! 4. An explicit `--config` file, when given
//!
//! Later layers override earlier ones key by key, so a project file that
//! only sets `[llm] model` keeps the user's `[llm] api_key`.

use crate::config::schema::CohortConfig;
use crate::error::{CohortError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
    override_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: Self::user_config_path(),
            project_config_path: Self::project_config_path(),
            override_path: None,
        }
    }

    /// Loader reading from explicit user and project locations
    pub fn with_paths(user: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: user.into(),
            project_config_path: project.into(),
            override_path: None,
        }
    }

    /// Add a final layer that must exist
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    fn user_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cohort")
            .join("cohort.toml")
    }

    fn project_config_path() -> PathBuf {
        PathBuf::from(".cohort").join("cohort.toml")
    }

    pub fn user_path(&self) -> &Path {
        &self.user_config_path
    }

    pub fn project_path(&self) -> &Path {
        &self.project_config_path
    }

    /// Merge every layer, expand `${VAR}` references, then apply environment
    /// fallbacks.
    pub async fn load(&self) -> Result<CohortConfig> {
        let mut merged = toml::Table::new();

        for path in [&self.user_config_path, &self.project_config_path] {
            if !path.exists() {
                debug!(path = %path.display(), "Config layer not present");
                continue;
            }
            let layer = Self::read_table(path).await?;
            debug!(path = %path.display(), "Loaded config layer");
            merge_tables(&mut merged, layer);
        }

        if let Some(path) = &self.override_path {
            if !path.exists() {
                return Err(CohortError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            merge_tables(&mut merged, Self::read_table(path).await?);
        }

        let mut config: CohortConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| CohortError::Config(format!("Invalid configuration: {}", e)))?;

        config.resolve_env_vars();
        config.apply_env_fallbacks();

        info!(model = %config.llm.model_name(), "Configuration loaded");
        Ok(config)
    }

    async fn read_table(path: &Path) -> Result<toml::Table> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| CohortError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| CohortError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive key-wise merge; `overlay` wins on conflicts
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
