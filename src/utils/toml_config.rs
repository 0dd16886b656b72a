//! TOML-based configuration for Lumen
//!
//! This module provides declarative configuration for LLM providers, named models,
//! the research loop and the search backends via a TOML file (`lumen.toml`).
//!
//! Secrets are never stored in the file: provider and search credentials are
//! referenced by environment variable name (`*_env` fields) and resolved at runtime.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use [`ConfigManager`] for thread-safe access to the current configuration.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Root configuration structure loaded from lumen.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LumenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    /// Research loop settings
    #[serde(default)]
    pub research: ResearchConfig,

    /// Search backend order and credentials
    #[serde(default)]
    pub search: SearchConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_model_max_tokens() -> u32 {
    4096
}

// ============= Research Configuration =============

/// Settings for the research loop and the models each agent runs on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Model (from [models]) used for query generation and synthesis
    #[serde(default = "default_agent_model")]
    pub researcher_model: String,

    /// Model used for sufficiency analysis
    #[serde(default = "default_agent_model")]
    pub analyst_model: String,

    /// Model used to stream the final report
    #[serde(default = "default_agent_model")]
    pub writer_model: String,

    /// `auto` for detection, or a fixed language code (`en`, `zh`, `ja`, ...)
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_initial_search_query_count")]
    pub initial_search_query_count: u32,

    #[serde(default = "default_max_research_loops")]
    pub max_research_loops: u32,

    /// Results requested from the search aggregator per generated query
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Upper bound on a whole research session; unbounded when unset
    #[serde(default)]
    pub session_timeout_secs: Option<u64>,

    /// Capacity of the per-session event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_agent_model() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_initial_search_query_count() -> u32 {
    3
}

fn default_max_research_loops() -> u32 {
    2
}

fn default_results_per_query() -> usize {
    5
}

fn default_event_buffer() -> usize {
    64
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            researcher_model: default_agent_model(),
            analyst_model: default_agent_model(),
            writer_model: default_agent_model(),
            language: default_language(),
            initial_search_query_count: default_initial_search_query_count(),
            max_research_loops: default_max_research_loops(),
            results_per_query: default_results_per_query(),
            session_timeout_secs: None,
            event_buffer: default_event_buffer(),
        }
    }
}

// ============= Search Configuration =============

/// Known search backends, in the order they are tried by default
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    Tavily,
    SerpApi,
    Google,
    DuckDuckGo,
    Wikipedia,
}

impl SearchBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchBackendKind::Tavily => "tavily",
            SearchBackendKind::SerpApi => "serpapi",
            SearchBackendKind::Google => "google",
            SearchBackendKind::DuckDuckGo => "duckduckgo",
            SearchBackendKind::Wikipedia => "wikipedia",
        }
    }
}

impl std::fmt::Display for SearchBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Backends in fallback order; the first non-empty result wins
    #[serde(default = "default_backends")]
    pub backends: Vec<SearchBackendKind>,

    /// Per-backend call timeout
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_tavily_env")]
    pub tavily_api_key_env: String,

    #[serde(default = "default_serpapi_env")]
    pub serpapi_api_key_env: String,

    #[serde(default = "default_google_key_env")]
    pub google_api_key_env: String,

    #[serde(default = "default_google_cse_env")]
    pub google_cse_id_env: String,

    /// Wikipedia language edition, e.g. `en` or `zh`
    #[serde(default = "default_wikipedia_lang")]
    pub wikipedia_lang: String,

    /// Result pages per iteration whose full text is fetched for synthesis; 0 disables
    #[serde(default = "default_fetch_pages")]
    pub fetch_pages: usize,

    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Characters of page text kept per fetched page
    #[serde(default = "default_page_max_chars")]
    pub page_max_chars: usize,
}

fn default_backends() -> Vec<SearchBackendKind> {
    vec![
        SearchBackendKind::Tavily,
        SearchBackendKind::SerpApi,
        SearchBackendKind::Google,
        SearchBackendKind::DuckDuckGo,
        SearchBackendKind::Wikipedia,
    ]
}

fn default_search_timeout() -> u64 {
    10
}

fn default_tavily_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_serpapi_env() -> String {
    "SERPAPI_API_KEY".to_string()
}

fn default_google_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_google_cse_env() -> String {
    "GOOGLE_CSE_ID".to_string()
}

fn default_wikipedia_lang() -> String {
    "en".to_string()
}

fn default_fetch_pages() -> usize {
    3
}

fn default_page_timeout() -> u64 {
    8
}

fn default_page_max_chars() -> usize {
    4000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            timeout_secs: default_search_timeout(),
            tavily_api_key_env: default_tavily_env(),
            serpapi_api_key_env: default_serpapi_env(),
            google_api_key_env: default_google_key_env(),
            google_cse_id_env: default_google_cse_env(),
            wikipedia_lang: default_wikipedia_lang(),
            fetch_pages: default_fetch_pages(),
            page_timeout_secs: default_page_timeout(),
            page_max_chars: default_page_max_chars(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    UnusedProvider,
    UnusedModel,
    MissingSearchCredential,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by research.{1} does not exist")]
    MissingModel(String, String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl LumenConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: LumenConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in self.providers.values() {
            match provider {
                ProviderConfig::OpenAI { api_key_env, .. } => {
                    self.validate_env_var(api_key_env)?;
                }
                ProviderConfig::Ollama { .. } => {}
            }
        }

        for (model_name, model_config) in &self.models {
            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    model_name.clone(),
                ));
            }
        }

        for (field, model) in self.research.agent_models() {
            if !self.models.contains_key(model) {
                return Err(ConfigError::MissingModel(
                    model.to_string(),
                    field.to_string(),
                ));
            }
        }

        if self.research.initial_search_query_count == 0 {
            return Err(ConfigError::ValidationError(
                "research.initial_search_query_count must be at least 1".to_string(),
            ));
        }

        if self.research.results_per_query == 0 {
            return Err(ConfigError::ValidationError(
                "research.results_per_query must be at least 1".to_string(),
            ));
        }

        if self.research.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "research.event_buffer must be at least 1".to_string(),
            ));
        }

        if crate::research::language::LanguageSetting::parse(&self.research.language).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "research.language '{}' is not 'auto' or a supported language code",
                self.research.language
            )));
        }

        if self.search.backends.is_empty() {
            return Err(ConfigError::ValidationError(
                "search.backends must list at least one backend".to_string(),
            ));
        }

        if self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.search.fetch_pages > 0 && self.search.page_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.page_timeout_secs must be greater than zero when fetch_pages is set"
                    .to_string(),
            ));
        }

        if self.search.page_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "search.page_max_chars must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for backend in &self.search.backends {
            if !seen.insert(backend) {
                return Err(ConfigError::ValidationError(format!(
                    "search backend '{}' is listed more than once",
                    backend
                )));
            }
        }

        Ok(())
    }

    /// Validate configuration with warnings for unused items and absent credentials
    ///
    /// Returns Ok with warnings, or Err if validation fails
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(self.check_unused_providers());
        warnings.extend(self.check_unused_models());
        warnings.extend(self.check_search_credentials());

        Ok(warnings)
    }

    /// Check for providers that aren't referenced by any model
    fn check_unused_providers(&self) -> Vec<ConfigWarning> {
        let referenced: HashSet<_> = self.models.values().map(|m| m.provider.as_str()).collect();

        self.providers
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedProvider,
                message: format!(
                    "Provider '{}' is defined but not referenced by any model",
                    name
                ),
            })
            .collect()
    }

    /// Check for models that none of the research agents use
    fn check_unused_models(&self) -> Vec<ConfigWarning> {
        let referenced: HashSet<_> = self
            .research
            .agent_models()
            .into_iter()
            .map(|(_, model)| model)
            .collect();

        self.models
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedModel,
                message: format!(
                    "Model '{}' is defined but not used by any research agent",
                    name
                ),
            })
            .collect()
    }

    /// Backends listed in [search] whose credentials are absent will be skipped
    fn check_search_credentials(&self) -> Vec<ConfigWarning> {
        self.search
            .backends
            .iter()
            .flat_map(|backend| {
                self.search
                    .credential_envs(*backend)
                    .into_iter()
                    .filter(|env| self.resolve_env(env).is_none())
                    .map(move |env| ConfigWarning {
                        kind: ConfigWarningKind::MissingSearchCredential,
                        message: format!(
                            "Search backend '{}' will be skipped: {} is not set",
                            backend, env
                        ),
                    })
            })
            .collect()
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get model by name
    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }
}

impl ResearchConfig {
    /// `(field name, model name)` for each research agent
    pub fn agent_models(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("researcher_model", self.researcher_model.as_str()),
            ("analyst_model", self.analyst_model.as_str()),
            ("writer_model", self.writer_model.as_str()),
        ]
    }
}

impl SearchConfig {
    /// Environment variables a backend needs before it can be constructed
    pub fn credential_envs(&self, backend: SearchBackendKind) -> Vec<&str> {
        match backend {
            SearchBackendKind::Tavily => vec![self.tavily_api_key_env.as_str()],
            SearchBackendKind::SerpApi => vec![self.serpapi_api_key_env.as_str()],
            SearchBackendKind::Google => vec![
                self.google_api_key_env.as_str(),
                self.google_cse_id_env.as_str(),
            ],
            SearchBackendKind::DuckDuckGo | SearchBackendKind::Wikipedia => vec![],
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<LumenConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
    changes: Arc<watch::Sender<Arc<LumenConfig>>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = Arc::new(LumenConfig::load(&path)?);
        let (changes, _) = watch::channel(Arc::clone(&config));

        Ok(Self {
            config: Arc::new(ArcSwap::new(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
            changes: Arc::new(changes),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: LumenConfig) -> Self {
        let config = Arc::new(config);
        let (changes, _) = watch::channel(Arc::clone(&config));
        Self {
            config: Arc::new(ArcSwap::new(config)),
            config_path: PathBuf::from("lumen.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
            changes: Arc::new(changes),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<LumenConfig> {
        self.config.load_full()
    }

    /// Receive every configuration that replaces the current one
    pub fn subscribe(&self) -> watch::Receiver<Arc<LumenConfig>> {
        self.changes.subscribe()
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = Arc::new(LumenConfig::load(&self.config_path)?);
        self.config.store(Arc::clone(&new_config));
        self.changes.send_replace(new_config);

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let changes = Arc::clone(&self.changes);
        let watched_file = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event.paths.iter().any(|p| {
                        p.file_name().map(|n| n.to_os_string()) == watched_file
                    });
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|t| t.elapsed() < debounce_duration) {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match LumenConfig::load(&config_path) {
                    Ok(new_config) => {
                        let new_config = Arc::new(new_config);
                        config_arc.store(Arc::clone(&new_config));
                        changes.send_replace(new_config);
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
            changes: Arc::clone(&self.changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config() -> String {
        r#"
[server]
host = "127.0.0.1"
port = 3000
log_level = "debug"

[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "qwen2.5:7b"

[models.default]
provider = "ollama-local"
model = "qwen2.5:7b"
temperature = 0.3
max_tokens = 4096

[research]
language = "auto"
initial_search_query_count = 3
max_research_loops = 2

[search]
backends = ["duckduckgo", "wikipedia"]
timeout_secs = 5
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config: LumenConfig =
            toml::from_str(&create_test_config()).expect("Failed to parse config");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.log_level, "debug");
        assert!(config.providers.contains_key("ollama-local"));
        assert!(config.models.contains_key("default"));
        assert_eq!(
            config.search.backends,
            vec![SearchBackendKind::DuckDuckGo, SearchBackendKind::Wikipedia]
        );
        assert_eq!(config.search.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: LumenConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_level, "info");

        assert_eq!(config.research.initial_search_query_count, 3);
        assert_eq!(config.research.max_research_loops, 2);
        assert_eq!(config.research.language, "auto");
        assert_eq!(config.research.session_timeout_secs, None);
        assert_eq!(config.research.researcher_model, "default");

        assert_eq!(config.search.backends.len(), 5);
        assert_eq!(config.search.backends[0], SearchBackendKind::Tavily);
        assert_eq!(config.search.timeout_secs, 10);
        assert_eq!(config.search.fetch_pages, 3);
        assert_eq!(config.search.page_timeout(), Duration::from_secs(8));
        assert_eq!(config.search.page_max_chars, 4000);
    }

    #[test]
    fn test_validation_missing_provider() {
        let content = r#"
[models.default]
provider = "nonexistent"
model = "qwen2.5:7b"
"#;
        let config: LumenConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProvider(p, m)) if p == "nonexistent" && m == "default"
        ));
    }

    #[test]
    fn test_validation_missing_agent_model() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.research.writer_model = "writer".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingModel(m, field)) if m == "writer" && field == "writer_model"
        ));
    }

    #[test]
    fn test_validation_rejects_zero_query_count() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.research.initial_search_query_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_unknown_language() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.research.language = "klingon".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("klingon")
        ));
    }

    #[test]
    fn test_validation_page_timeout_only_matters_when_fetching() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.search.page_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("page_timeout_secs")
        ));

        config.search.fetch_pages = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_duplicate_backend() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.search.backends = vec![SearchBackendKind::Wikipedia, SearchBackendKind::Wikipedia];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        let content = r#"
[search]
backends = ["altavista"]
"#;
        assert!(toml::from_str::<LumenConfig>(content).is_err());
    }

    #[test]
    fn test_openai_provider_requires_env_var() {
        let content = r#"
[providers.openai]
type = "openai"
api_key_env = "LUMEN_TEST_KEY_THAT_IS_NEVER_SET"
default_model = "gpt-4o-mini"

[models.default]
provider = "openai"
model = "gpt-4o-mini"
"#;
        let config: LumenConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(name)) if name == "LUMEN_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_unused_model_and_missing_credential_warnings() {
        let mut config: LumenConfig = toml::from_str(&create_test_config()).unwrap();
        config.models.insert(
            "spare".to_string(),
            ModelConfig {
                provider: "ollama-local".to_string(),
                model: "llama3.2".to_string(),
                temperature: 0.7,
                max_tokens: 512,
            },
        );
        config.search.backends.insert(0, SearchBackendKind::Tavily);
        config.search.tavily_api_key_env = "LUMEN_TEST_TAVILY_NEVER_SET".to_string();

        let warnings = config.validate_with_warnings().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.kind == ConfigWarningKind::UnusedModel && w.message.contains("spare")));
        assert!(warnings.iter().any(|w| {
            w.kind == ConfigWarningKind::MissingSearchCredential && w.message.contains("tavily")
        }));
    }

    #[test]
    fn test_load_from_file_and_reload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", create_test_config()).unwrap();

        let manager = ConfigManager::new(file.path()).unwrap();
        let mut changes = manager.subscribe();
        assert_eq!(manager.config().research.max_research_loops, 2);

        let updated = create_test_config().replace("max_research_loops = 2", "max_research_loops = 4");
        fs::write(file.path(), updated).unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().research.max_research_loops, 4);
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().research.max_research_loops, 4);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            LumenConfig::load("/definitely/not/here/lumen.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_config_manager_from_config() {
        let config: LumenConfig = toml::from_str(&create_test_config()).unwrap();

        let manager = ConfigManager::from_config(config.clone());
        let loaded = manager.config();

        assert_eq!(loaded.server.host, config.server.host);
        assert_eq!(loaded.server.port, config.server.port);
    }
}
