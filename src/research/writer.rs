//! Report stage: stream the final report

use crate::llm::LLMClient;
use crate::research::analyst::AnalysisVerdict;
use crate::research::language::Language;
use crate::types::{Result, Source};
use async_stream::stream;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Finite, non-restartable sequence of report chunks
pub type ReportStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

fn system_prompt(language: Language) -> String {
    format!(
        "You are a Writer Agent specialized in creating clear, comprehensive research reports.\n\n\
         Current date: {date}\n\n\
         ## Report Structure\n\
         1. **Executive Summary** (2-3 sentences capturing the core answer)\n\
         2. **Key Findings** (3-6 discoveries with implications)\n\
         3. **Detailed Analysis** (organized by theme with supporting evidence)\n\
         4. **Conclusion & Recommendations**\n\n\
         ## Quality Standards\n\
         - Use precise, professional language\n\
         - Format with headers, bullets and tables where they help\n\
         - Cite sources inline with their URLs\n\
         - Only state what the findings support\n\
         - Output in {language}",
        date = Utc::now().format("%B %d, %Y"),
        language = language.display_name(),
    )
}

/// Deterministic closing section listing the sources gathered during research
pub fn sources_section(sources: &[Source]) -> String {
    if sources.is_empty() {
        return "\n\n## Sources\n\nNo external sources were consulted; no search backend returned results for this research.\n"
            .to_string();
    }

    let mut section = String::from("\n\n## Sources\n\n");
    for (i, source) in sources.iter().enumerate() {
        section.push_str(&format!("{}. [{}]({})\n", i + 1, source.label, source.value));
    }
    section
}

/// Writer agent wrapper
pub struct Writer {
    llm: Arc<dyn LLMClient>,
}

impl Writer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Start generating the report
    ///
    /// Model chunks are yielded as they arrive, followed by one sources chunk.
    /// An error item ends the stream.
    pub async fn run(
        &self,
        query: &str,
        findings: &str,
        verdict: Option<&AnalysisVerdict>,
        sources: &[Source],
        language: Language,
    ) -> Result<ReportStream> {
        let analysis = verdict.map(|v| v.analysis.as_str()).unwrap_or_default();
        let prompt = format!(
            "Create a comprehensive research report on '{}' based on this analysis:\n\n{}\n\nResearch findings:\n{}",
            query, analysis, findings
        );

        let mut chunks = self
            .llm
            .stream_with_system(&system_prompt(language), &prompt)
            .await?;
        let closing = sources_section(sources);

        Ok(Box::pin(stream! {
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => yield Ok(text),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            yield Ok(closing);
        }))
    }
}
