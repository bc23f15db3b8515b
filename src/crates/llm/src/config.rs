//! Configuration for OpenAI-compatible providers.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for a chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Sampling temperature. Routing works best deterministic.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum retries for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RemoteLlmConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    /// Read the key from `env_var`.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects configurations that cannot possibly authenticate.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound(
                "no API key configured for the language model".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(LlmError::ConfigError("base_url is empty".to_string()));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteLlmConfig::new("sk-test", "https://api.openai.com/v1", "gpt-4o")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(1)
            .with_temperature(0.2);

        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 1);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_key_rejected() {
        let config = RemoteLlmConfig::new("", "https://api.openai.com/v1", "gpt-4o");
        assert!(config.validate().unwrap_err().is_auth_error());
    }

    #[test]
    fn test_serde_defaults() {
        let config: RemoteLlmConfig = serde_json::from_value(serde_json::json!({
            "api_key": "k",
            "base_url": "http://localhost:1234/v1",
            "model": "local"
        }))
        .unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.temperature, 0.0);
    }
}
