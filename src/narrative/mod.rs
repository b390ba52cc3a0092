//! Narrative strategies.
//!
//! A strategy turns one aggregation (or the raw parameters) into titled
//! bullet text. Report components only see the [`NarrativeStrategy`] trait, so
//! the templated and externally generated variants are interchangeable.

pub mod conversation;
pub mod external;
pub mod prompts;
pub mod templated;

pub use conversation::{ChatTurn, CompletionConfig, ConversationLog, OllamaCompletion, TextCompletion};
pub use external::ExternalNarrative;
pub use templated::TemplatedNarrative;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::analysis::{CountTable, CrossTab, OddsTable};
use crate::config::{NarrativeConfig, NarrativeMode};
use crate::error::{ReportError, ReportResult};
use crate::models::{ArticleRecord, CaseType, QueryParameters};

/// The closed set of narration requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    Methodology,
    BiasRating,
    BiasCategory,
    BiasRatingVsTopics,
    BiasCategoryVsTopics,
    #[allow(dead_code)] // Bare odds-table narration; comparison sections send both sides
    Tendency,
    BiasRatingComparison,
    BiasCategoryComparison,
    CaseStudy,
    KeyMessage,
    Conclusions,
}

impl NarrativeKind {
    pub fn key(&self) -> &'static str {
        match self {
            NarrativeKind::Methodology => "methodology",
            NarrativeKind::BiasRating => "bias_rating",
            NarrativeKind::BiasCategory => "bias_category",
            NarrativeKind::BiasRatingVsTopics => "bias_rating_vs_topics",
            NarrativeKind::BiasCategoryVsTopics => "bias_category_vs_topics",
            NarrativeKind::Tendency => "tendency",
            NarrativeKind::BiasRatingComparison => "bias_rating_comparison",
            NarrativeKind::BiasCategoryComparison => "bias_category_comparison",
            NarrativeKind::CaseStudy => "case_study",
            NarrativeKind::KeyMessage => "key_message",
            NarrativeKind::Conclusions => "conclusions",
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Condensed statistics behind the closing sections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingsSummary {
    pub selected_publisher: String,
    pub compared_publishers: Vec<String>,
    pub article_count: u64,
    pub bias_ratings: CountTable,
    pub bias_categories: CountTable,
}

/// Data handed to a strategy for one narration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum NarrativePayload {
    Parameters(QueryParameters),
    Counts(CountTable),
    CrossTab(CrossTab),
    Odds(OddsTable),
    /// Odds of the selected publisher plus the biased-subset counts on both sides.
    Comparison {
        odds: OddsTable,
        selected: CountTable,
        others: CountTable,
    },
    CaseStudy {
        case: CaseType,
        articles: Vec<ArticleRecord>,
    },
    Findings(FindingsSummary),
}

impl NarrativePayload {
    pub fn shape(&self) -> &'static str {
        match self {
            NarrativePayload::Parameters(_) => "parameters",
            NarrativePayload::Counts(_) => "counts",
            NarrativePayload::CrossTab(_) => "cross_tab",
            NarrativePayload::Odds(_) => "odds",
            NarrativePayload::Comparison { .. } => "comparison",
            NarrativePayload::CaseStudy { .. } => "case_study",
            NarrativePayload::Findings(_) => "findings",
        }
    }

    pub(crate) fn mismatch(&self, kind: NarrativeKind) -> ReportError {
        ReportError::PayloadMismatch {
            kind: kind.key().to_string(),
            payload: self.shape().to_string(),
        }
    }
}

/// One titled block of narration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NarrativeEntry {
    pub title: String,
    pub bullets: Vec<String>,
}

/// Output of one narration call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Narration {
    pub entries: Vec<NarrativeEntry>,
}

impl Narration {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Untitled single-entry narration.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            entries: vec![NarrativeEntry {
                title: String::new(),
                bullets: vec![text.into()],
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Title of the first entry, blank when there is none.
    pub fn title(&self) -> &str {
        self.entries.first().map(|e| e.title.as_str()).unwrap_or("")
    }

    /// Bullets of the first entry joined by newlines.
    pub fn body(&self) -> String {
        self.entries
            .first()
            .map(|e| e.bullets.join("\n"))
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait NarrativeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn narrate(
        &self,
        kind: NarrativeKind,
        payload: &NarrativePayload,
        log: &mut ConversationLog,
    ) -> ReportResult<Narration>;
}

/// Build the strategy selected by configuration.
pub fn build_strategy(
    config: &NarrativeConfig,
    params: &QueryParameters,
) -> ReportResult<Box<dyn NarrativeStrategy>> {
    match config.mode {
        NarrativeMode::Templated => Ok(Box::new(TemplatedNarrative::new(
            params.selected_publisher.clone(),
        ))),
        NarrativeMode::External => {
            let backend = OllamaCompletion::new(CompletionConfig {
                ollama_url: config.ollama_url.clone(),
                model_name: config.model.clone(),
                temperature: config.temperature,
                ..CompletionConfig::default()
            })?;
            Ok(Box::new(ExternalNarrative::new(
                Box::new(backend),
                params.selected_publisher.clone(),
                Duration::from_secs(config.deadline_seconds),
            )))
        }
    }
}
