//! # Lumen - multi-agent deep research
//!
//! Lumen answers open-ended research questions by coordinating three model-backed
//! agents: a researcher that searches the web and synthesizes findings, an analyst
//! that decides whether knowledge gaps remain, and a writer that streams a cited
//! report. Research repeats while gaps remain, up to a configured bound.
//!
//! ## Overview
//!
//! Lumen can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `lumen-server` binary
//! 2. **As a library** - Embed the research loop in your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use lumen::{ConfigManager, ResearchCoordinator, ResearchRequest};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigManager::new("lumen.toml")?.config();
//!     let coordinator = Arc::new(ResearchCoordinator::from_config(&config).await?);
//!
//!     let request = ResearchRequest::new("state of solid-state batteries").with_counts(3, 2);
//!     let mut events = Box::pin(coordinator.stream(request));
//!     while let Some(event) = events.next().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI and compatible APIs |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui/` |
//!
//! ## Modules
//!
//! - [`research`] - The research state machine, agents and progress events
//! - [`search`] - Search backends and the first-success aggregator
//! - [`llm`] - LLM client implementations
//! - [`api`] - REST and SSE handlers and routes
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reloading

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface definitions.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Multi-agent research coordination.
pub mod research;
/// Web search backends and aggregation.
pub mod search;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider, ProviderRegistry};
pub use research::{ProgressEvent, ResearchCoordinator};
pub use search::{SearchAggregator, SearchBackend};
pub use types::{AppError, ResearchRequest, ResearchResponse, Result};
pub use utils::toml_config::{ConfigManager, LumenConfig};

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML-based configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    /// Research coordinator built from the current configuration
    pub coordinator: Arc<ArcSwap<ResearchCoordinator>>,
}

impl AppState {
    pub fn new(config_manager: Arc<ConfigManager>, coordinator: ResearchCoordinator) -> Self {
        Self {
            config_manager,
            coordinator: Arc::new(ArcSwap::from_pointee(coordinator)),
        }
    }

    /// The coordinator in effect right now
    pub fn coordinator(&self) -> Arc<ResearchCoordinator> {
        self.coordinator.load_full()
    }

    /// Rebuild the coordinator whenever the configuration is reloaded
    ///
    /// Sessions already running keep the coordinator they started with. A
    /// configuration that fails to build is logged and the previous coordinator
    /// stays in place.
    pub fn spawn_config_listener(&self) -> tokio::task::JoinHandle<()> {
        let mut changes = self.config_manager.subscribe();
        let coordinator = Arc::clone(&self.coordinator);

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let config = changes.borrow_and_update().clone();
                match ResearchCoordinator::from_config(&config).await {
                    Ok(rebuilt) => {
                        coordinator.store(Arc::new(rebuilt));
                        tracing::info!("Research coordinator rebuilt from reloaded configuration");
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Keeping previous research coordinator, reloaded configuration is unusable: {}",
                            e
                        );
                    }
                }
            }
        })
    }
}
