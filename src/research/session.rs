//! Per-request research state
//!
//! A [`Query`] is fixed when a session starts. Everything that accumulates while
//! the research loop runs lives in the [`Session`], which is owned by exactly one
//! coordinator run and dropped when the event stream closes.

use crate::research::analyst::AnalysisVerdict;
use crate::research::events::{CompletePayload, ResearchMetadata};
use crate::research::language::Language;
use crate::search::{normalize_url, SearchResult, SearchSummary};
use crate::types::{AppError, Result, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use utoipa::ToSchema;

/// Search queries issued by each follow-up research iteration, capped at the
/// initial query count
pub const FOLLOW_UP_QUERY_COUNT: u32 = 2;

/// Separator placed between the findings of successive iterations
pub const ADDITIONAL_RESEARCH_SEPARATOR: &str = "\n\n--- Additional Research ---\n\n";

/// Validated effort configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Effort {
    initial_search_query_count: u32,
    max_research_loops: u32,
}

impl Effort {
    /// Validate raw request counts
    ///
    /// Only the lower bounds are enforced; counts beyond `u32::MAX` saturate.
    pub fn new(initial_search_query_count: i64, max_research_loops: i64) -> Result<Self> {
        if initial_search_query_count < 1 {
            return Err(AppError::Validation(format!(
                "initial_search_query_count must be at least 1, got {}",
                initial_search_query_count
            )));
        }
        if max_research_loops < 0 {
            return Err(AppError::Validation(format!(
                "max_research_loops must not be negative, got {}",
                max_research_loops
            )));
        }

        Ok(Self {
            initial_search_query_count: saturate(initial_search_query_count),
            max_research_loops: saturate(max_research_loops),
        })
    }

    pub fn initial_search_query_count(&self) -> u32 {
        self.initial_search_query_count
    }

    pub fn max_research_loops(&self) -> u32 {
        self.max_research_loops
    }

    pub fn follow_up_query_count(&self) -> u32 {
        FOLLOW_UP_QUERY_COUNT.min(self.initial_search_query_count)
    }

    /// Queries to generate for a research iteration (0 is the initial pass)
    pub fn query_count_for(&self, iteration: u32) -> u32 {
        if iteration == 0 {
            self.initial_search_query_count
        } else {
            self.follow_up_query_count()
        }
    }
}

fn saturate(count: i64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// The immutable research question
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: String,
    language: Language,
    effort: Effort,
}

impl Query {
    pub fn new(text: impl Into<String>, language: Language, effort: Effort) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation(
                "query must not be empty".to_string(),
            ));
        }
        Ok(Self {
            text,
            language,
            effort,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn effort(&self) -> Effort {
        self.effort
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialization,
    Research,
    Analysis,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Research => "research",
            Stage::Analysis => "analysis",
            Stage::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Error,
}

/// Latest output of a stage; overwritten each time the stage runs again
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StageOutput {
    pub stage: Stage,
    /// Short rendering for display
    pub content: String,
    pub full_content: String,
    pub timestamp: DateTime<Utc>,
    pub status: StageStatus,
}

/// Mutable record of one research run
#[derive(Debug)]
pub struct Session {
    query: Query,
    summaries: Vec<SearchSummary>,
    sources: Vec<Source>,
    seen_sources: HashSet<String>,
    findings: String,
    verdicts: Vec<AnalysisVerdict>,
    loop_counter: u32,
    streaming_report: String,
    final_report: Option<String>,
    stage_outputs: BTreeMap<Stage, StageOutput>,
}

impl Session {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            summaries: Vec::new(),
            sources: Vec::new(),
            seen_sources: HashSet::new(),
            findings: String::new(),
            verdicts: Vec::new(),
            loop_counter: 0,
            streaming_report: String::new(),
            final_report: None,
            stage_outputs: BTreeMap::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn findings(&self) -> &str {
        &self.findings
    }

    pub fn summaries(&self) -> &[SearchSummary] {
        &self.summaries
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn verdicts(&self) -> &[AnalysisVerdict] {
        &self.verdicts
    }

    pub fn latest_verdict(&self) -> Option<&AnalysisVerdict> {
        self.verdicts.last()
    }

    pub fn loop_counter(&self) -> u32 {
        self.loop_counter
    }

    pub fn streaming_report(&self) -> &str {
        &self.streaming_report
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    pub fn stage_output(&self, stage: Stage) -> Option<&StageOutput> {
        self.stage_outputs.get(&stage)
    }

    pub fn active_stage_count(&self) -> usize {
        self.stage_outputs
            .values()
            .filter(|o| o.status == StageStatus::Active)
            .count()
    }

    /// Mark a stage active, replacing its previous output
    ///
    /// Fails if a different stage is still active.
    pub fn begin_stage(&mut self, stage: Stage, content: impl Into<String>) -> Result<()> {
        if let Some(active) = self
            .stage_outputs
            .values()
            .find(|o| o.status == StageStatus::Active && o.stage != stage)
        {
            return Err(AppError::Internal(format!(
                "cannot start stage '{}' while '{}' is still active",
                stage, active.stage
            )));
        }

        let content = content.into();
        self.stage_outputs.insert(
            stage,
            StageOutput {
                stage,
                full_content: content.clone(),
                content,
                timestamp: Utc::now(),
                status: StageStatus::Active,
            },
        );
        Ok(())
    }

    pub fn complete_stage(
        &mut self,
        stage: Stage,
        content: impl Into<String>,
        full_content: impl Into<String>,
    ) {
        self.stage_outputs.insert(
            stage,
            StageOutput {
                stage,
                content: content.into(),
                full_content: full_content.into(),
                timestamp: Utc::now(),
                status: StageStatus::Completed,
            },
        );
    }

    /// Flag whichever stage is running as failed
    pub fn fail_active(&mut self) {
        for output in self.stage_outputs.values_mut() {
            if output.status == StageStatus::Active {
                output.status = StageStatus::Error;
                output.timestamp = Utc::now();
            }
        }
    }

    /// Add an iteration's findings; later iterations go after the separator
    pub fn append_findings(&mut self, new_findings: &str) {
        let new_findings = new_findings.trim();
        if new_findings.is_empty() {
            return;
        }
        if !self.findings.is_empty() {
            self.findings.push_str(ADDITIONAL_RESEARCH_SEPARATOR);
        }
        self.findings.push_str(new_findings);
    }

    /// Keep the summaries of an iteration and collect its result URLs as sources
    pub fn record_search(&mut self, summaries: &[SearchSummary], results: &[SearchResult]) {
        self.summaries.extend_from_slice(summaries);

        for result in results {
            if result.url.trim().is_empty() {
                continue;
            }
            let normalized = normalize_url(&result.url);
            if self.seen_sources.insert(normalized.clone()) {
                let label = if result.title.trim().is_empty() {
                    result.domain().unwrap_or_else(|| normalized.clone())
                } else {
                    result.title.trim().to_string()
                };
                self.sources.push(Source {
                    label,
                    value: result.url.clone(),
                    short_url: normalized,
                });
            }
        }
    }

    pub fn record_verdict(&mut self, verdict: AnalysisVerdict) {
        self.verdicts.push(verdict);
    }

    /// Count one more follow-up iteration
    pub fn begin_follow_up(&mut self) -> Result<u32> {
        let max = self.query.effort().max_research_loops();
        if self.loop_counter >= max {
            return Err(AppError::Internal(format!(
                "research loop limit of {} already reached",
                max
            )));
        }
        self.loop_counter += 1;
        Ok(self.loop_counter)
    }

    pub fn push_report_chunk(&mut self, chunk: &str) {
        self.streaming_report.push_str(chunk);
    }

    /// Freeze the streamed chunks as the final report
    pub fn finish_report(&mut self) -> String {
        let report = self.streaming_report.clone();
        self.final_report = Some(report.clone());
        report
    }

    /// Payload of the terminal `complete` event
    pub fn complete_payload(&self) -> CompletePayload {
        let stage_outputs = self
            .stage_outputs
            .iter()
            .map(|(stage, output)| (*stage, output.content.clone()))
            .collect();
        let full_stage_content = self
            .stage_outputs
            .iter()
            .map(|(stage, output)| (*stage, output.full_content.clone()))
            .collect();

        CompletePayload {
            query: self.query.text().to_string(),
            final_report: self.final_report.clone().unwrap_or_default(),
            stage_outputs,
            full_stage_content,
            sources_gathered: self.sources.clone(),
            research_metadata: ResearchMetadata {
                research_loops: self.loop_counter,
                timestamp: Utc::now(),
                query: self.query.text().to_string(),
                language: self.query.language(),
            },
        }
    }
}
