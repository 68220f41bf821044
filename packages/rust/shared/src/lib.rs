//! Shared types, error model, and configuration for LinkScout.
//!
//! This crate is the foundation depended on by all other LinkScout crates.
//! It provides:
//! - [`LinkScoutError`], the unified error type
//! - Domain types ([`SearchCriteria`], [`RawProfileRecord`], [`EvaluationResult`], [`Contact`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)
//! - [`RetryPolicy`] for transient navigation failures

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AiConfig, AppConfig, BrowserConfig, GenerationConfig, NavigatorConfig, OrchestratorConfig,
    PathsConfig, RetryConfig, SearchDefaults, config_dir, config_file_path, init_config,
    init_config_in, load_config, load_config_from, render_config,
};
pub use error::{ErrorKind, LinkScoutError, Result};
pub use retry::RetryPolicy;
pub use types::{
    ConnectionDegree, Contact, EvaluationResult, Justification, RawProfileRecord, SearchCriteria,
    SearchOptions, SearchRunId, UNCERTAIN_SCORE, UserContext, normalize_score,
};
