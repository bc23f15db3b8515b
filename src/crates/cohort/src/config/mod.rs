//! Configuration for cohort
//!
//! Layered TOML configuration with `${VAR}` expansion and environment
//! fallbacks for secrets. See [`loader::ConfigLoader`] for the lookup order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    CohortConfig, DatabaseConfig, EmailConfig, ExecutionConfig, LlmConfig, LoggingConfig,
    SearchConfig,
};
