//! Application configuration for LinkScout.
//!
//! User config lives at `~/.linkscout/linkscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "linkscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".linkscout";

// ---------------------------------------------------------------------------
// Config structs (matching linkscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative-text settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Page session settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Navigation retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Search defaults.
    #[serde(default)]
    pub search: SearchDefaults,

    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// `[ai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Ollama server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    /// Maximum records scored concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_ai_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:3b".into()
}
fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_ai_timeout() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    4
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Kept for parity with interactive engines; the HTTP session ignores it.
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-call timeout for session operations.
    #[serde(default = "default_browser_timeout")]
    pub timeout_ms: u64,

    /// Pause between companies and every `pause_every_records` cards.
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_ms: u64,

    /// Wait after a scroll or filter submission.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    #[serde(default = "default_max_scroll_attempts")]
    pub max_scroll_attempts: u32,

    #[serde(default = "default_pause_every")]
    pub pause_every_records: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_browser_timeout(),
            rate_limit_delay_ms: default_rate_limit_delay(),
            settle_ms: default_settle(),
            max_scroll_attempts: default_max_scroll_attempts(),
            pause_every_records: default_pause_every(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "https://www.linkedin.com".into()
}
fn default_user_agent() -> String {
    concat!("linkscout/", env!("CARGO_PKG_VERSION")).into()
}
fn default_browser_timeout() -> u64 {
    30_000
}
fn default_rate_limit_delay() -> u64 {
    2_000
}
fn default_settle() -> u64 {
    2_000
}
fn default_max_scroll_attempts() -> u32 {
    10
}
fn default_pause_every() -> usize {
    10
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            backoff_multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    1_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_backoff() -> u64 {
    60_000
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    #[serde(default = "default_total_results")]
    pub total_results: usize,

    #[serde(default = "default_results_per_company")]
    pub results_per_company: usize,

    /// Used when `--companies` is not given.
    #[serde(default)]
    pub companies: Vec<String>,

    /// Used when `--job-titles` is not given.
    #[serde(default)]
    pub job_titles: Vec<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            total_results: default_total_results(),
            results_per_company: default_results_per_company(),
            companies: Vec::new(),
            job_titles: Vec::new(),
        }
    }
}

fn default_total_results() -> usize {
    50
}
fn default_results_per_company() -> usize {
    20
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the storage-state file.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// Default directory for exported results.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_session_dir() -> String {
    "./session_data".into()
}
fn default_export_dir() -> String {
    "./exports".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime navigator configuration.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub base_url: String,
    /// Individual timeout applied to every session call.
    pub call_timeout: Duration,
    pub rate_limit_delay: Duration,
    pub settle: Duration,
    pub max_scroll_attempts: u32,
    pub pause_every_records: usize,
}

impl From<&AppConfig> for NavigatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.browser.base_url.trim_end_matches('/').to_string(),
            call_timeout: Duration::from_millis(config.browser.timeout_ms),
            rate_limit_delay: Duration::from_millis(config.browser.rate_limit_delay_ms),
            settle: Duration::from_millis(config.browser.settle_ms),
            max_scroll_attempts: config.browser.max_scroll_attempts,
            pause_every_records: config.browser.pause_every_records,
        }
    }
}

/// Runtime generation configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub call_timeout: Duration,
}

impl From<&AppConfig> for GenerationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.ai.model.clone(),
            endpoint: config.ai.endpoint.trim_end_matches('/').to_string(),
            temperature: config.ai.temperature,
            max_tokens: config.ai.max_tokens,
            call_timeout: Duration::from_secs(config.ai.timeout_secs),
        }
    }
}

/// Runtime orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause before every company except the first.
    pub inter_company_delay: Duration,
    /// Maximum records scored and justified at once.
    pub max_concurrency: usize,
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            inter_company_delay: Duration::from_millis(config.browser.rate_limit_delay_ms),
            max_concurrency: config.ai.max_concurrency.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.linkscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LinkScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.linkscout/linkscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LinkScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LinkScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    init_config_in(&dir)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| LinkScoutError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = render_config(&AppConfig::default())?;

    std::fs::write(&path, content).map_err(|e| LinkScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Render a config as pretty TOML.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| LinkScoutError::config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let toml_str = render_config(&AppConfig::default()).expect("serialize default config");
        assert!(toml_str.contains("llama3.2:3b"));
        assert!(toml_str.contains("rate_limit_delay_ms"));
        assert!(toml_str.contains("session_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let toml_str = render_config(&AppConfig::default()).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.ai.endpoint, "http://localhost:11434");
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.search.total_results, 50);
        assert_eq!(parsed.search.results_per_company, 20);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[ai]
model = "mistral"

[search]
companies = ["Acme", "Zenith"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.ai.model, "mistral");
        assert_eq!(config.ai.max_tokens, 1000);
        assert_eq!(config.search.companies, vec!["Acme", "Zenith"]);
        assert_eq!(config.browser.max_scroll_attempts, 10);
        assert_eq!(config.paths.export_dir, "./exports");
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let mut app = AppConfig::default();
        app.browser.base_url = "https://example.test/".into();
        app.ai.max_concurrency = 0;

        let nav = NavigatorConfig::from(&app);
        assert_eq!(nav.base_url, "https://example.test");
        assert_eq!(nav.call_timeout, Duration::from_secs(30));
        assert_eq!(nav.pause_every_records, 10);

        let generation = GenerationConfig::from(&app);
        assert_eq!(generation.call_timeout, Duration::from_secs(30));
        assert!((generation.temperature - 0.1).abs() < f32::EPSILON);

        let orch = OrchestratorConfig::from(&app);
        assert_eq!(orch.inter_company_delay, Duration::from_millis(2000));
        assert_eq!(orch.max_concurrency, 1);
    }

    #[test]
    fn init_and_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("ls-config-{}", uuid::Uuid::now_v7()));
        let path = init_config_in(&dir).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.ai.model, "llama3.2:3b");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = std::env::temp_dir().join(format!("ls-config-bad-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("linkscout.toml");
        std::fs::write(&path, "[ai\nmodel = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
