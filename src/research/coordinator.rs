use crate::{
    llm::ProviderRegistry,
    research::{
        analyst::{truncate_chars, AnalysisVerdict, Analyst},
        events::{CompletePayload, EventBus, ProgressEvent, StageData},
        language::{classify_query, search_strategy, LanguageResolver, LanguageSetting},
        researcher::Researcher,
        session::{Effort, Query, Session, Stage},
        writer::Writer,
    },
    search::{PageFetcher, SearchAggregator},
    types::{AppError, ResearchRequest, ResearchResponse, Result},
    utils::toml_config::{LumenConfig, ResearchConfig},
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Characters of the analysis shown as the analysis stage's short output
const ANALYSIS_PREVIEW_CHARS: usize = 500;

/// Characters of the report shown as the report stage's short output
const REPORT_PREVIEW_CHARS: usize = 1000;

/// States of the research loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchState {
    Initializing,
    Researching,
    Analyzing,
    Reporting,
    Done,
}

/// Where to go after an analysis
///
/// Reporting once the findings are sufficient or the follow-up budget is spent;
/// otherwise another research iteration.
pub fn next_after_analysis(
    verdict: &AnalysisVerdict,
    loop_counter: u32,
    max_research_loops: u32,
) -> ResearchState {
    if verdict.sufficient || loop_counter >= max_research_loops {
        ResearchState::Reporting
    } else {
        ResearchState::Researching
    }
}

/// Overall progress for a point inside research iteration `iteration`
///
/// `fraction` is 0.0 when the iteration's research starts, 0.5 when its
/// analysis starts and 1.0 when the analysis is done.
fn loop_progress(iteration: u32, max_research_loops: u32, fraction: f32) -> u8 {
    if iteration == 0 {
        let points: [(f32, u8); 3] = [(0.0, 15), (0.5, 45), (1.0, 55)];
        return points
            .iter()
            .rev()
            .find(|(at, _)| fraction >= *at)
            .map(|(_, p)| *p)
            .unwrap_or(15);
    }
    let max = max_research_loops.max(1) as f32;
    let done = (iteration - 1) as f32 + fraction.clamp(0.0, 1.0);
    (55.0 + done / max * 25.0).round().min(80.0) as u8
}

/// Defaults applied to requests that leave counts unset
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub session_timeout: Option<Duration>,
    pub event_buffer: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self::from_config(&ResearchConfig::default())
    }
}

impl ResearchSettings {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            initial_search_query_count: config.initial_search_query_count,
            max_research_loops: config.max_research_loops,
            session_timeout: config.session_timeout_secs.map(Duration::from_secs),
            event_buffer: config.event_buffer,
        }
    }
}

/// Drives one research session per request through
/// initialization, research, analysis (repeated while gaps remain) and report.
pub struct ResearchCoordinator {
    researcher: Researcher,
    analyst: Analyst,
    writer: Writer,
    language: LanguageResolver,
    settings: ResearchSettings,
}

impl ResearchCoordinator {
    pub fn new(researcher: Researcher, analyst: Analyst, writer: Writer) -> Self {
        Self {
            researcher,
            analyst,
            writer,
            language: LanguageResolver::auto(),
            settings: ResearchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ResearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_language(mut self, language: LanguageResolver) -> Self {
        self.language = language;
        self
    }

    /// Build the agents and search chain described by a loaded configuration
    pub async fn from_config(config: &LumenConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(config);
        let research = &config.research;

        let researcher_llm = registry
            .shared_client_for_model(&research.researcher_model)
            .await?;
        let analyst_llm = registry
            .shared_client_for_model(&research.analyst_model)
            .await?;
        let writer_llm = registry
            .shared_client_for_model(&research.writer_model)
            .await?;

        let setting = LanguageSetting::parse(&research.language).ok_or_else(|| {
            AppError::Configuration(format!(
                "Unknown research language '{}'",
                research.language
            ))
        })?;

        let search = SearchAggregator::from_config(&config.search);
        info!(
            backends = ?search.backend_names(),
            researcher = researcher_llm.model_name(),
            analyst = analyst_llm.model_name(),
            writer = writer_llm.model_name(),
            "Research coordinator ready"
        );

        Ok(Self::new(
            Researcher::new(researcher_llm, search, research.results_per_query)
                .with_page_fetcher(
                    PageFetcher::from_config(&config.search),
                    config.search.fetch_pages,
                ),
            Analyst::new(analyst_llm),
            Writer::new(writer_llm),
        )
        .with_language(LanguageResolver::new(setting))
        .with_settings(ResearchSettings::from_config(research)))
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Validate a request into an immutable query
    ///
    /// Explicit counts win over the effort preset, which wins over configured
    /// defaults.
    pub fn prepare(&self, request: &ResearchRequest) -> Result<Query> {
        let topic = request
            .topic()
            .ok_or_else(|| AppError::Validation("query must not be empty".to_string()))?;

        let (preset_queries, preset_loops) = match request.effort {
            Some(effort) => effort.counts(),
            None => (
                self.settings.initial_search_query_count as i64,
                self.settings.max_research_loops as i64,
            ),
        };
        let effort = Effort::new(
            request.initial_search_query_count.unwrap_or(preset_queries),
            request.max_research_loops.unwrap_or(preset_loops),
        )?;

        Query::new(topic, self.language.resolve(topic), effort)
    }

    /// Run a session, yielding its events in order
    ///
    /// The stream ends after the terminal event. Dropping it cancels the
    /// session.
    pub fn stream(
        self: Arc<Self>,
        request: ResearchRequest,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let cancel = CancellationToken::new();
        let (bus, mut rx) = EventBus::channel(self.settings.event_buffer, cancel.clone());

        tokio::spawn(async move {
            let _ = self.run(request, bus).await;
        });

        stream! {
            let _guard = cancel.drop_guard();
            let mut terminated = false;

            while let Some(event) = rx.recv().await {
                terminated = event.is_terminal();
                yield event;
                if terminated {
                    break;
                }
            }

            if !terminated {
                yield ProgressEvent::error(&AppError::Internal(
                    "research task ended without a result".to_string(),
                ));
            }
        }
    }

    /// Run a session to completion for callers that don't consume events
    pub async fn research(&self, request: ResearchRequest) -> Result<ResearchResponse> {
        let (bus, mut rx) = EventBus::channel(self.settings.event_buffer, CancellationToken::new());

        let drain = async move {
            while let Some(event) = rx.recv().await {
                debug!(event = event.event_type(), "Research event");
            }
        };
        let (result, _) = tokio::join!(self.run(request, bus), drain);

        let payload = result?;
        Ok(ResearchResponse {
            query: payload.query,
            final_report: payload.final_report,
            sources_gathered: payload.sources_gathered,
            research_metadata: payload.research_metadata,
        })
    }

    /// Validate, execute and report the outcome of one session on `bus`
    ///
    /// Failures become a single terminal error event. Cancellation ends the
    /// session silently.
    async fn run(&self, request: ResearchRequest, mut bus: EventBus) -> Result<CompletePayload> {
        let query = match self.prepare(&request) {
            Ok(query) => query,
            Err(e) => {
                warn!("Rejected research request: {}", e);
                let _ = bus.emit(ProgressEvent::error(&e)).await;
                return Err(e);
            }
        };

        info!(
            query = query.text(),
            language = query.language().as_str(),
            initial_search_query_count = query.effort().initial_search_query_count(),
            max_research_loops = query.effort().max_research_loops(),
            "Starting research session"
        );

        let cancel = bus.cancellation().clone();
        let timeout = self.settings.session_timeout;
        let mut session = Session::new(query);

        let outcome = {
            let pipeline = self.execute(&mut session, &mut bus);
            let limited = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, pipeline)
                        .await
                        .unwrap_or(Err(AppError::Timeout(limit.as_secs()))),
                    None => pipeline.await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => Err(AppError::Cancelled),
                result = limited => result,
            }
        };

        match outcome {
            Ok(()) => {
                info!(
                    research_loops = session.loop_counter(),
                    sources = session.sources().len(),
                    "Research session complete"
                );
                Ok(session.complete_payload())
            }
            Err(AppError::Cancelled) => {
                info!("Research session cancelled");
                Err(AppError::Cancelled)
            }
            Err(e) => {
                error!("Research session failed: {}", e);
                session.fail_active();
                let _ = bus.emit(ProgressEvent::error(&e)).await;
                Err(e)
            }
        }
    }

    /// The state machine
    async fn execute(&self, session: &mut Session, bus: &mut EventBus) -> Result<()> {
        let max_loops = session.query().effort().max_research_loops();
        let mut state = ResearchState::Initializing;

        loop {
            debug!(?state, loop_counter = session.loop_counter(), "Research state");
            state = match state {
                ResearchState::Initializing => {
                    self.initialize(session, bus).await?;
                    ResearchState::Researching
                }
                ResearchState::Researching => {
                    self.research_iteration(session, bus).await?;
                    ResearchState::Analyzing
                }
                ResearchState::Analyzing => {
                    let verdict = self.analyze(session, bus).await?;
                    let next = next_after_analysis(&verdict, session.loop_counter(), max_loops);
                    if next == ResearchState::Researching {
                        session.begin_follow_up()?;
                    } else if !verdict.sufficient {
                        info!(max_loops, "Research loop limit reached, writing report");
                    }
                    next
                }
                ResearchState::Reporting => {
                    self.report(session, bus).await?;
                    ResearchState::Done
                }
                ResearchState::Done => return Ok(()),
            };
        }
    }

    async fn initialize(&self, session: &mut Session, bus: &mut EventBus) -> Result<()> {
        session.begin_stage(Stage::Initialization, "Initializing research")?;
        bus.emit(ProgressEvent::status(
            Stage::Initialization,
            5,
            "Initializing research",
        ))
        .await?;

        let overview = self.initialization_overview(session.query());
        let short = format!(
            "Researching '{}' in {}",
            session.query().text(),
            session.query().language().display_name()
        );
        session.complete_stage(Stage::Initialization, short.clone(), overview.clone());

        bus.emit(ProgressEvent::progress(
            Stage::Initialization,
            10,
            short,
            StageData::new(overview),
        ))
        .await
    }

    fn initialization_overview(&self, query: &Query) -> String {
        let query_type = classify_query(query.text());
        let engines = self.researcher.search().backend_names();
        let effort = query.effort();

        format!(
            "## Research Initialization\n\n\
             ### Query Analysis\n\
             - **Research Topic**: {topic}\n\
             - **Query Type**: {kind}\n\
             - **Query Length**: {chars} characters ({words} words)\n\
             - **Detected Language**: {language} ({code})\n\
             - **Auto-Detection**: {auto}\n\n\
             ### Agent Configuration\n\
             - **Researcher Agent**: {researcher}\n\
             - **Analyst Agent**: {analyst}\n\
             - **Writer Agent**: {writer}\n\
             - **Initial Search Queries**: {initial}\n\
             - **Max Research Loops**: {loops}\n\n\
             ### Search Strategy\n{strategy}",
            topic = query.text(),
            kind = query_type.label(),
            chars = query.text().chars().count(),
            words = query.text().split_whitespace().count(),
            language = query.language().display_name(),
            code = query.language().code(),
            auto = if self.language.is_auto() { "enabled" } else { "disabled" },
            researcher = self.researcher.model_name(),
            analyst = self.analyst.model_name(),
            writer = self.writer.model_name(),
            initial = effort.initial_search_query_count(),
            loops = effort.max_research_loops(),
            strategy = search_strategy(query_type, query.language(), &engines),
        )
    }

    async fn research_iteration(&self, session: &mut Session, bus: &mut EventBus) -> Result<()> {
        let iteration = session.loop_counter();
        let max_loops = session.query().effort().max_research_loops();
        let count = session.query().effort().query_count_for(iteration);

        let message = if iteration == 0 {
            "Collecting information".to_string()
        } else {
            format!("Conducting round {} of additional research", iteration)
        };
        session.begin_stage(Stage::Research, message.clone())?;
        bus.emit(ProgressEvent::status(
            Stage::Research,
            loop_progress(iteration, max_loops, 0.0),
            message,
        ))
        .await?;

        let gap = session
            .latest_verdict()
            .and_then(|v| v.gap_description.clone());
        let result = self
            .researcher
            .run(session.query(), count, session.findings(), gap.as_deref())
            .await?;

        session.record_search(&result.summaries, &result.results);
        session.append_findings(&result.findings);

        let summary = result.render_summary(session.query().text());
        session.complete_stage(Stage::Research, summary.clone(), session.findings().to_string());

        let progress = if iteration == 0 {
            35
        } else {
            loop_progress(iteration, max_loops, 0.5)
        };
        bus.emit(ProgressEvent::progress(
            Stage::Research,
            progress,
            result.progress_message(),
            StageData::new(summary).with_summaries(result.summaries),
        ))
        .await
    }

    async fn analyze(&self, session: &mut Session, bus: &mut EventBus) -> Result<AnalysisVerdict> {
        let iteration = session.loop_counter();
        let max_loops = session.query().effort().max_research_loops();

        session.begin_stage(Stage::Analysis, "Analyzing research results")?;
        bus.emit(ProgressEvent::status(
            Stage::Analysis,
            loop_progress(iteration, max_loops, 0.5),
            "Analyzing research results and identifying knowledge gaps",
        ))
        .await?;

        let verdict = self
            .analyst
            .run(
                session.query().text(),
                session.findings(),
                session.query().language(),
            )
            .await?;
        session.record_verdict(verdict.clone());

        let preview = truncate_chars(&verdict.analysis, ANALYSIS_PREVIEW_CHARS);
        session.complete_stage(Stage::Analysis, preview.clone(), verdict.analysis.clone());

        let message = if verdict.sufficient {
            "Findings are sufficient"
        } else {
            "Knowledge gaps identified"
        };
        bus.emit(ProgressEvent::progress(
            Stage::Analysis,
            loop_progress(iteration, max_loops, 1.0),
            message,
            StageData::new(preview).with_verdict(verdict.clone()),
        ))
        .await?;

        Ok(verdict)
    }

    async fn report(&self, session: &mut Session, bus: &mut EventBus) -> Result<()> {
        session.begin_stage(Stage::Report, "Generating final report")?;
        bus.emit(ProgressEvent::status(
            Stage::Report,
            85,
            "Generating final report",
        ))
        .await?;
        bus.emit(ProgressEvent::ReportStart {
            message: "Streaming final report".to_string(),
        })
        .await?;

        let mut chunks = self
            .writer
            .run(
                session.query().text(),
                session.findings(),
                session.latest_verdict(),
                session.sources(),
                session.query().language(),
            )
            .await?;

        while let Some(chunk) = chunks.next().await {
            if bus.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            let chunk = chunk?;
            session.push_report_chunk(&chunk);
            bus.emit(ProgressEvent::report_chunk(chunk)).await?;
        }

        let report = session.finish_report();
        session.complete_stage(
            Stage::Report,
            truncate_chars(&report, REPORT_PREVIEW_CHARS),
            report,
        );

        bus.emit(ProgressEvent::Complete {
            data: session.complete_payload(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn verdict(sufficient: bool) -> AnalysisVerdict {
        AnalysisVerdict::from_analysis(if sufficient {
            "Complete."
        } else {
            "Knowledge gap remains."
        })
    }

    #[rstest]
    #[case(true, 0, 1, ResearchState::Reporting)]
    #[case(false, 0, 1, ResearchState::Researching)]
    #[case(false, 1, 1, ResearchState::Reporting)]
    #[case(false, 0, 0, ResearchState::Reporting)]
    #[case(true, 0, 0, ResearchState::Reporting)]
    fn test_next_after_analysis(
        #[case] sufficient: bool,
        #[case] loop_counter: u32,
        #[case] max: u32,
        #[case] expected: ResearchState,
    ) {
        assert_eq!(
            next_after_analysis(&verdict(sufficient), loop_counter, max),
            expected
        );
    }

    #[test]
    fn test_loop_progress_is_monotonic() {
        let max = 3;
        let mut points = vec![5, 10];
        points.push(loop_progress(0, max, 0.0));
        points.push(35);
        points.push(loop_progress(0, max, 0.5));
        points.push(loop_progress(0, max, 1.0));
        for i in 1..=max {
            points.push(loop_progress(i, max, 0.0));
            points.push(loop_progress(i, max, 0.5));
            points.push(loop_progress(i, max, 1.0));
        }
        points.push(85);

        assert!(points.windows(2).all(|w| w[0] <= w[1]), "{:?}", points);
        assert_eq!(loop_progress(max, max, 1.0), 80);
    }
}
