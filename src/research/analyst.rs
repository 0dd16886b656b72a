//! Analysis stage: judge whether the findings so far are enough

use crate::llm::LLMClient;
use crate::research::language::Language;
use crate::types::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Phrases in an analysis that mean more research is wanted (matched case-insensitively)
pub const GAP_MARKERS: &[&str] = &[
    "additional research needed",
    "needs additional research",
    "more information required",
    "knowledge gap",
    "insufficient information",
    "知识空白",
    "不够清晰",
    "额外研究",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisVerdict {
    pub sufficient: bool,
    /// The analysis itself when the findings are insufficient; steers the next
    /// research iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_description: Option<String>,
    pub analysis: String,
}

impl AnalysisVerdict {
    /// Classify a free-form analysis by scanning for gap markers
    pub fn from_analysis(analysis: impl Into<String>) -> Self {
        let analysis = analysis.into();
        if needs_additional_research(&analysis) {
            Self {
                sufficient: false,
                gap_description: Some(analysis.clone()),
                analysis,
            }
        } else {
            Self {
                sufficient: true,
                gap_description: None,
                analysis,
            }
        }
    }
}

pub fn needs_additional_research(analysis: &str) -> bool {
    let lowered = analysis.to_lowercase();
    GAP_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}

fn system_prompt(language: Language) -> String {
    format!(
        "You are an Analyst Agent specialized in verifying information and extracting insights.\n\n\
         Current date: {date}\n\n\
         Your responsibilities:\n\
         1. Analyze research findings for accuracy and reliability\n\
         2. Identify key insights and patterns in the information\n\
         3. Assess the credibility of sources\n\
         4. Determine if additional research is needed\n\
         5. Highlight any knowledge gaps or conflicting information\n\n\
         Guidelines:\n\
         - Identify the most important insights (3-5 key points)\n\
         - Note any contradictions or uncertainties\n\
         - If the findings are not enough, say \"additional research needed\" and describe the knowledge gap\n\
         - Keep analysis focused and under 600 words\n\
         - Provide analysis in {language}",
        date = Utc::now().format("%B %d, %Y"),
        language = language.display_name(),
    )
}

/// Analyst agent wrapper
pub struct Analyst {
    llm: Arc<dyn LLMClient>,
}

impl Analyst {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub async fn run(&self, query: &str, findings: &str, language: Language) -> Result<AnalysisVerdict> {
        let prompt = format!(
            "Analyze these research findings about '{}' and determine if additional research is needed:\n\n{}",
            query, findings
        );

        let analysis = self
            .llm
            .generate_with_system(&system_prompt(language), &prompt)
            .await?;

        if analysis.trim().is_empty() {
            return Err(AppError::LLM("analyst returned an empty analysis".to_string()));
        }

        let verdict = AnalysisVerdict::from_analysis(analysis);
        tracing::debug!(sufficient = verdict.sufficient, "Analysis verdict");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockLLMClient;
    use rstest::rstest;

    #[rstest]
    #[case("Coverage is complete and consistent.", true)]
    #[case("Additional research needed on pricing.", false)]
    #[case("There is a KNOWLEDGE GAP around adoption.", false)]
    #[case("The topic needs additional research in Asia.", false)]
    #[case("Insufficient information about latency.", false)]
    #[case("这部分存在知识空白", false)]
    #[case("需要额外研究", false)]
    fn test_gap_detection(#[case] analysis: &str, #[case] sufficient: bool) {
        let verdict = AnalysisVerdict::from_analysis(analysis);
        assert_eq!(verdict.sufficient, sufficient);
        assert_eq!(verdict.gap_description.is_some(), !sufficient);
    }

    #[test]
    fn test_gap_description_is_the_analysis() {
        let analysis = format!("Knowledge gap: {}", "pricing data ".repeat(100));
        let verdict = AnalysisVerdict::from_analysis(analysis.clone());
        assert_eq!(verdict.gap_description.as_deref(), Some(analysis.as_str()));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("知识空白", 2), "知识...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn test_analyst_uses_llm_output() {
        let mut mock = MockLLMClient::new();
        mock.expect_generate_with_system()
            .returning(|_, prompt| {
                assert!(prompt.contains("determine if additional research is needed"));
                Ok("More information required about costs.".to_string())
            });

        let analyst = Analyst::new(Arc::new(mock));
        let verdict = analyst
            .run("solar panels", "Findings", Language::English)
            .await
            .unwrap();
        assert!(!verdict.sufficient);
    }

    #[tokio::test]
    async fn test_empty_analysis_is_an_error() {
        let mut mock = MockLLMClient::new();
        mock.expect_generate_with_system()
            .returning(|_, _| Ok("   ".to_string()));

        let analyst = Analyst::new(Arc::new(mock));
        let result = analyst.run("q", "f", Language::English).await;
        assert!(matches!(result, Err(AppError::LLM(_))));
    }
}
