//! Report components.
//!
//! Each component owns a fixed name and subsection list. `build` walks the
//! subsections in order, running aggregation, narration and chart saving for
//! each, and returns the component's schema fragment.

use async_trait::async_trait;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::analysis::{AggregationResult, Aggregator, Dimension, PublisherSelection};
use crate::error::{ReportError, ReportResult};
use crate::models::{CaseType, QueryParameters};
use crate::narrative::{
    ConversationLog, FindingsSummary, Narration, NarrativeKind, NarrativePayload,
    NarrativeStrategy,
};
use crate::report::case_studies::select_case_articles;
use crate::report::charts::ChartBackend;
use crate::report::schema::{CaseStudyEntry, ComponentSchema, SectionPayload};
use crate::report::scratch::ScratchDir;

pub const METHODOLOGY: &str = "Methodology";
pub const CASE_STUDIES: &str = "Case Studies";
pub const PUBLISHER_PERFORMANCE: &str = "Publisher Performance Overview";
pub const PUBLISHER_COMPARISON: &str = "Publisher Comparison";
pub const CONCLUSIONS: &str = "Conclusions";
pub const KEY_FINDINGS: &str = "Key Findings";

const PERFORMANCE_SUBSECTIONS: [(&str, &str); 4] = [
    ("bias_rating", "Analysis of Bias Ratings"),
    ("bias_category", "Analysis of Bias Categories"),
    ("bias_rating_vs_topics", "Analysis of Bias Ratings vs Topics"),
    ("bias_category_vs_topics", "Analysis of Bias Categories vs Topics"),
];

const COMPARISON_SUBSECTIONS: [(&str, &str); 2] = [
    (
        "tendency_bias_rating",
        "Analyzing Publisher's Tendency to Commit Bias",
    ),
    (
        "tendency_bias_category",
        "Analyzing Publisher's Tendency to Commit Certain Biases (by Category)",
    ),
];

/// Collaborators shared by every component of one run.
pub struct BuildContext<'a> {
    pub aggregator: &'a Aggregator,
    pub strategy: &'a dyn NarrativeStrategy,
    pub log: &'a mut ConversationLog,
    pub charts: &'a dyn ChartBackend,
    pub scratch: &'a ScratchDir,
    pub params: &'a QueryParameters,
    pub rng: &'a mut StdRng,
}

impl BuildContext<'_> {
    fn selected(&self) -> PublisherSelection {
        PublisherSelection::Single(self.params.selected_publisher.clone())
    }

    fn compared(&self) -> PublisherSelection {
        PublisherSelection::Group(self.params.compared_publishers.clone())
    }

    async fn narrate(
        &mut self,
        kind: NarrativeKind,
        payload: NarrativePayload,
    ) -> ReportResult<Narration> {
        debug!("Narrating {} via {}", kind, self.strategy.name());
        self.strategy.narrate(kind, &payload, self.log).await
    }

    /// Build and save one chart, returning its path.
    fn save_chart(
        &self,
        subsection: &str,
        result: &AggregationResult,
        dimension: Dimension,
    ) -> ReportResult<String> {
        let path = self.scratch.path_for(subsection, self.charts.extension());
        self.charts.build(result, dimension)?.save(&path)?;
        Ok(path.display().to_string())
    }

    fn findings(&self) -> ReportResult<FindingsSummary> {
        let selected = self.selected();
        Ok(FindingsSummary {
            selected_publisher: self.params.selected_publisher.clone(),
            compared_publishers: self.params.compared_publishers.clone(),
            article_count: self.aggregator.subset(&selected, false).len() as u64,
            bias_ratings: self.aggregator.count_1d(&selected, "bias_rating")?,
            bias_categories: self.aggregator.count_1d(&selected, "bias_category")?,
        })
    }
}

#[async_trait]
pub trait ReportComponent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Subsection keys in build order.
    fn subsections(&self) -> Vec<&'static str>;

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema>;
}

fn invalid_subsection(component: &str, subsection: &str) -> ReportError {
    ReportError::InvalidSubsection {
        component: component.to_string(),
        subsection: subsection.to_string(),
    }
}

fn title_for(
    component: &str,
    table: &[(&'static str, &'static str)],
    subsection: &str,
) -> ReportResult<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == subsection)
        .map(|(_, title)| *title)
        .ok_or_else(|| invalid_subsection(component, subsection))
}

fn chart_section(title: &str, narration: &Narration, chart_filepath: String) -> SectionPayload {
    SectionPayload::Chart {
        title: title.to_string(),
        chart_title: narration.title().to_string(),
        chart_filepath,
        bullets: narration.body(),
    }
}

/// Shared shape of the three single-text components.
async fn text_fragment(
    component: &'static str,
    kind: NarrativeKind,
    ctx: &mut BuildContext<'_>,
) -> ReportResult<ComponentSchema> {
    let payload = match kind {
        NarrativeKind::Methodology => NarrativePayload::Parameters(ctx.params.clone()),
        _ => NarrativePayload::Findings(ctx.findings()?),
    };
    let narration = ctx.narrate(kind, payload).await?;
    Ok(ComponentSchema::Text {
        title: component.to_string(),
        text: narration.body(),
    })
}

pub struct Methodology;

#[async_trait]
impl ReportComponent for Methodology {
    fn name(&self) -> &'static str {
        METHODOLOGY
    }

    fn subsections(&self) -> Vec<&'static str> {
        vec![NarrativeKind::Methodology.key()]
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        text_fragment(METHODOLOGY, NarrativeKind::Methodology, ctx).await
    }
}

pub struct KeyFindings;

#[async_trait]
impl ReportComponent for KeyFindings {
    fn name(&self) -> &'static str {
        KEY_FINDINGS
    }

    fn subsections(&self) -> Vec<&'static str> {
        vec![NarrativeKind::KeyMessage.key()]
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        text_fragment(KEY_FINDINGS, NarrativeKind::KeyMessage, ctx).await
    }
}

pub struct Conclusions;

#[async_trait]
impl ReportComponent for Conclusions {
    fn name(&self) -> &'static str {
        CONCLUSIONS
    }

    fn subsections(&self) -> Vec<&'static str> {
        vec![NarrativeKind::Conclusions.key()]
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        text_fragment(CONCLUSIONS, NarrativeKind::Conclusions, ctx).await
    }
}

/// Counts and cross-tabs of the selected publisher.
pub struct PublisherPerformance;

impl PublisherPerformance {
    pub async fn build_subsection(
        &self,
        ctx: &mut BuildContext<'_>,
        subsection: &str,
    ) -> ReportResult<SectionPayload> {
        let title = title_for(self.name(), &PERFORMANCE_SUBSECTIONS, subsection)?;
        let selected = ctx.selected();

        let (kind, dimension, result) = match subsection {
            "bias_rating" => (
                NarrativeKind::BiasRating,
                Dimension::BiasRating,
                AggregationResult::Counts(ctx.aggregator.count_1d(&selected, "bias_rating")?),
            ),
            "bias_category" => (
                NarrativeKind::BiasCategory,
                Dimension::BiasCategory,
                AggregationResult::Counts(ctx.aggregator.count_1d(&selected, "bias_category")?),
            ),
            "bias_rating_vs_topics" => (
                NarrativeKind::BiasRatingVsTopics,
                Dimension::BiasRating,
                AggregationResult::CrossTab(ctx.aggregator.count_2d(
                    &selected,
                    "bias_rating",
                    "topic",
                )?),
            ),
            _ => (
                NarrativeKind::BiasCategoryVsTopics,
                Dimension::BiasCategory,
                AggregationResult::CrossTab(ctx.aggregator.count_2d(
                    &selected,
                    "bias_category",
                    "topic",
                )?),
            ),
        };

        let payload = match &result {
            AggregationResult::Counts(counts) => NarrativePayload::Counts(counts.clone()),
            AggregationResult::CrossTab(tab) => NarrativePayload::CrossTab(tab.clone()),
            AggregationResult::Odds(odds) => NarrativePayload::Odds(odds.clone()),
        };
        let narration = ctx.narrate(kind, payload).await?;
        let path = ctx.save_chart(subsection, &result, dimension)?;
        Ok(chart_section(title, &narration, path))
    }
}

#[async_trait]
impl ReportComponent for PublisherPerformance {
    fn name(&self) -> &'static str {
        PUBLISHER_PERFORMANCE
    }

    fn subsections(&self) -> Vec<&'static str> {
        PERFORMANCE_SUBSECTIONS.iter().map(|(key, _)| *key).collect()
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        let mut sections = IndexMap::new();
        for subsection in self.subsections() {
            debug!("Building {} / {}", self.name(), subsection);
            let payload = self.build_subsection(ctx, subsection).await?;
            sections.insert(subsection.to_string(), payload);
        }
        Ok(ComponentSchema::Sections(sections))
    }
}

/// Odds of the selected publisher against the compared group.
pub struct PublisherComparison;

impl PublisherComparison {
    pub async fn build_subsection(
        &self,
        ctx: &mut BuildContext<'_>,
        subsection: &str,
    ) -> ReportResult<SectionPayload> {
        let title = title_for(self.name(), &COMPARISON_SUBSECTIONS, subsection)?;
        let (kind, dimension) = match subsection {
            "tendency_bias_rating" => (NarrativeKind::BiasRatingComparison, Dimension::BiasRating),
            _ => (
                NarrativeKind::BiasCategoryComparison,
                Dimension::BiasCategory,
            ),
        };

        let odds = ctx.aggregator.tendency(
            &ctx.params.selected_publisher,
            &ctx.params.compared_publishers,
            dimension.key(),
        )?;
        let (selected_group, compared_group) = (ctx.selected(), ctx.compared());
        debug!(
            "{} vs {}: {} odds rows",
            selected_group.label(),
            compared_group.label(),
            odds.rows.len()
        );
        let selected = ctx
            .aggregator
            .count_1d_biased(&selected_group, dimension.key())?;
        let others = ctx
            .aggregator
            .count_1d_biased(&compared_group, dimension.key())?;

        let narration = ctx
            .narrate(
                kind,
                NarrativePayload::Comparison {
                    odds: odds.clone(),
                    selected,
                    others,
                },
            )
            .await?;
        let path = ctx.save_chart(subsection, &AggregationResult::Odds(odds), dimension)?;
        Ok(chart_section(title, &narration, path))
    }
}

#[async_trait]
impl ReportComponent for PublisherComparison {
    fn name(&self) -> &'static str {
        PUBLISHER_COMPARISON
    }

    fn subsections(&self) -> Vec<&'static str> {
        COMPARISON_SUBSECTIONS.iter().map(|(key, _)| *key).collect()
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        let mut sections = IndexMap::new();
        for subsection in self.subsections() {
            debug!("Building {} / {}", self.name(), subsection);
            let payload = self.build_subsection(ctx, subsection).await?;
            sections.insert(subsection.to_string(), payload);
        }
        Ok(ComponentSchema::Sections(sections))
    }
}

/// Representative articles per case type.
pub struct CaseStudies {
    pub examples_per_case: usize,
    pub include_rating_buckets: bool,
}

impl Default for CaseStudies {
    fn default() -> Self {
        Self {
            examples_per_case: 1,
            include_rating_buckets: true,
        }
    }
}

impl CaseStudies {
    fn cases(&self) -> impl Iterator<Item = CaseType> + '_ {
        CaseType::ALL
            .into_iter()
            .filter(|c| self.include_rating_buckets || !c.is_rating_bucket())
    }

    /// Entries for one case; an empty pool yields an empty list.
    pub async fn build_subsection(
        &self,
        ctx: &mut BuildContext<'_>,
        subsection: &str,
    ) -> ReportResult<SectionPayload> {
        let case = CaseType::from_label(subsection)
            .filter(|c| self.cases().any(|allowed| allowed == *c))
            .ok_or_else(|| invalid_subsection(self.name(), subsection))?;

        let articles = match select_case_articles(
            ctx.aggregator,
            &ctx.params.selected_publisher,
            case,
            self.examples_per_case,
            &mut *ctx.rng,
        ) {
            Ok(articles) => articles,
            Err(e) if e.is_insufficient_data() => {
                warn!("{}; leaving case study empty", e);
                return Ok(SectionPayload::CaseStudies(Vec::new()));
            }
            Err(e) => return Err(e),
        };

        let narration = ctx
            .narrate(
                NarrativeKind::CaseStudy,
                NarrativePayload::CaseStudy { case, articles },
            )
            .await?;

        let entries = narration
            .entries
            .into_iter()
            .map(|entry| CaseStudyEntry {
                title: entry.title,
                bullets: entry.bullets.join("\n"),
            })
            .collect();
        Ok(SectionPayload::CaseStudies(entries))
    }
}

#[async_trait]
impl ReportComponent for CaseStudies {
    fn name(&self) -> &'static str {
        CASE_STUDIES
    }

    fn subsections(&self) -> Vec<&'static str> {
        self.cases().map(|c| c.label()).collect()
    }

    async fn build(&self, ctx: &mut BuildContext<'_>) -> ReportResult<ComponentSchema> {
        let mut sections = IndexMap::new();
        for subsection in self.subsections() {
            debug!("Building {} / {}", self.name(), subsection);
            let payload = self.build_subsection(ctx, subsection).await?;
            sections.insert(subsection.to_string(), payload);
        }
        info!("{} built with {} case types", self.name(), sections.len());
        Ok(ComponentSchema::Sections(sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BiasCategory::*;
    use crate::narrative::{ExternalNarrative, TemplatedNarrative};
    use crate::report::charts::SpecChartBackend;
    use crate::testing::{article, params, table, ScriptedCompletion};
    use rand::SeedableRng;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok, block_on};

    struct Harness {
        aggregator: Aggregator,
        params: QueryParameters,
        scratch: ScratchDir,
        log: ConversationLog,
        rng: StdRng,
        _temp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let scratch = ScratchDir::new(temp.path().join("tmp"));
            scratch.reset().unwrap();
            Self {
                aggregator: Aggregator::new(table(vec![
                    article("1", "X", 1, "Politics", &[Generalisation, Prominence]),
                    article("2", "X", 2, "Politics | Religion", &[Misrepresentation]),
                    article("3", "X", 0, "Religion", &[]),
                    article("4", "Y", 1, "Politics", &[NegativeBehaviour, HeadlineOrImagery]),
                    article("5", "Y", 0, "Sport", &[]),
                    article("6", "Y", 2, "Sport", &[Generalisation]),
                ])),
                params: params("X", &["Y"]),
                scratch,
                log: ConversationLog::new(),
                rng: StdRng::seed_from_u64(3),
                _temp: temp,
            }
        }

        fn ctx<'a>(
            &'a mut self,
            strategy: &'a dyn NarrativeStrategy,
            charts: &'a dyn ChartBackend,
        ) -> BuildContext<'a> {
            BuildContext {
                aggregator: &self.aggregator,
                strategy,
                log: &mut self.log,
                charts,
                scratch: &self.scratch,
                params: &self.params,
                rng: &mut self.rng,
            }
        }
    }

    #[tokio::test]
    async fn test_performance_writes_chart_per_subsection() {
        let mut harness = Harness::new();
        let strategy = TemplatedNarrative::new("X");
        let charts = SpecChartBackend;
        let mut ctx = harness.ctx(&strategy, &charts);

        let fragment = PublisherPerformance.build(&mut ctx).await.unwrap();
        let ComponentSchema::Sections(sections) = &fragment else {
            panic!("expected sections");
        };
        let keys: Vec<&str> = sections.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "bias_rating",
                "bias_category",
                "bias_rating_vs_topics",
                "bias_category_vs_topics"
            ]
        );

        let Some(SectionPayload::Chart {
            title,
            chart_title,
            chart_filepath,
            bullets,
        }) = fragment.section("bias_rating")
        else {
            panic!("expected chart section");
        };
        assert_eq!(title, "Analysis of Bias Ratings");
        assert_eq!(chart_title, "");
        assert!(chart_filepath.ends_with("bias_rating.json"));
        assert!(bullets.contains("2 articles"));
        assert_eq!(harness.scratch.files().unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_subsection_is_rejected() {
        let mut harness = Harness::new();
        let strategy = TemplatedNarrative::new("X");
        let charts = SpecChartBackend;
        let mut ctx = harness.ctx(&strategy, &charts);

        let err = assert_err!(block_on(
            PublisherPerformance.build_subsection(&mut ctx, "topic_vs_location")
        ));
        assert!(matches!(
            err,
            ReportError::InvalidSubsection { ref component, .. } if component == PUBLISHER_PERFORMANCE
        ));

        let err = assert_err!(block_on(
            PublisherComparison.build_subsection(&mut ctx, "bias_rating")
        ));
        assert!(matches!(err, ReportError::InvalidSubsection { .. }));

        let buckets_off = CaseStudies {
            include_rating_buckets: false,
            ..CaseStudies::default()
        };
        let err = assert_err!(block_on(buckets_off.build_subsection(&mut ctx, "Very Biased")));
        assert!(matches!(err, ReportError::InvalidSubsection { .. }));

        // A rejected key writes nothing.
        assert_ok!(block_on(
            PublisherPerformance.build_subsection(&mut ctx, "bias_rating")
        ));
        drop(ctx);
        assert_eq!(harness.scratch.files().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_comparison_narrates_plain_text() {
        let mut harness = Harness::new();
        let strategy = TemplatedNarrative::new("X");
        let charts = SpecChartBackend;
        let mut ctx = harness.ctx(&strategy, &charts);

        let fragment = PublisherComparison.build(&mut ctx).await.unwrap();
        let Some(SectionPayload::Chart { bullets, chart_title, .. }) =
            fragment.section("tendency_bias_rating")
        else {
            panic!("expected chart section");
        };
        assert_eq!(chart_title, "");
        assert!(!bullets.contains('['));
        assert_eq!(
            bullets,
            "X published 2 biased articles compared to 2 from other publishers"
        );
    }

    #[tokio::test]
    async fn test_case_studies_degrade_to_empty_lists() {
        let mut harness = Harness::new();
        let strategy = TemplatedNarrative::new("X");
        let charts = SpecChartBackend;
        let mut ctx = harness.ctx(&strategy, &charts);

        let fragment = CaseStudies::default().build(&mut ctx).await.unwrap();
        let ComponentSchema::Sections(sections) = &fragment else {
            panic!("expected sections");
        };
        assert_eq!(sections.len(), 7);
        assert_eq!(
            sections.get("Negative Behaviour"),
            Some(&SectionPayload::CaseStudies(vec![]))
        );

        let Some(SectionPayload::CaseStudies(entries)) = sections.get("Very Biased") else {
            panic!("expected case studies");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Article 2");
        assert!(entries[0].bullets.contains("Bias rating: Very Biased"));
    }

    #[tokio::test]
    async fn test_text_components_use_external_narration() {
        let mut harness = Harness::new();
        let backend = ScriptedCompletion::new(vec!["[Methodology]\n- Articles were rated"]);
        let calls = backend.call_counter();
        let strategy = ExternalNarrative::new(Box::new(backend), "X", Duration::from_secs(5));
        let charts = SpecChartBackend;
        let mut ctx = harness.ctx(&strategy, &charts);

        let fragment = Methodology.build(&mut ctx).await.unwrap();
        assert_eq!(
            fragment,
            ComponentSchema::Text {
                title: "Methodology".to_string(),
                text: "Articles were rated".to_string(),
            }
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        // System prompt plus one exchange.
        assert_eq!(harness.log.len(), 3);
    }
}
