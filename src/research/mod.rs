//! Multi-Agent Research Coordination
//!
//! This module runs the deep research loop: a researcher agent gathers web
//! information, an analyst agent judges whether it is enough, and a writer agent
//! streams the final cited report.
//!
//! # Architecture
//!
//! - [`coordinator::ResearchCoordinator`] - Drives the explicit state machine
//!   and publishes [`events::ProgressEvent`]s
//! - [`researcher::Researcher`] - Search query generation, concurrent search, synthesis
//! - [`analyst::Analyst`] - Sufficiency verdicts via gap marker phrases
//! - [`writer::Writer`] - Chunked report generation
//! - [`language::LanguageResolver`] - Fixes the output language per session
//! - [`session::Session`] - Everything a single run accumulates
//!
//! # Usage
//!
//! ```ignore
//! use lumen::research::coordinator::ResearchCoordinator;
//! use lumen::types::ResearchRequest;
//! use futures::StreamExt;
//!
//! let coordinator = Arc::new(ResearchCoordinator::from_config(&config).await?);
//!
//! let mut events = Box::pin(coordinator.stream(ResearchRequest::new("quantum computing")));
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```
//!
//! # Research Workflow
//!
//! 1. **Initialization** - Resolve the language and validate effort
//! 2. **Research** - Generate queries, search, synthesize findings
//! 3. **Analysis** - Decide whether knowledge gaps remain
//! 4. **Additional Research** - Repeat 2-3 while gaps remain, bounded by `max_research_loops`
//! 5. **Report** - Stream the report and finish with the full result

pub mod analyst;
pub mod coordinator;
pub mod events;
pub mod language;
pub mod researcher;
pub mod session;
pub mod writer;

pub use coordinator::{ResearchCoordinator, ResearchSettings};
pub use events::{EventBus, ProgressEvent};
pub use language::{Language, LanguageResolver};
pub use session::{Effort, Query, Session, Stage};
