//! End-to-end report sequencing.

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::analysis::Aggregator;
use crate::config::{Config, ReportConfig};
use crate::error::{ReportError, ReportResult};
use crate::models::{ArticleTable, QueryParameters, RawArticle};
use crate::narrative::{build_strategy, ConversationLog, NarrativeStrategy};
use crate::report::charts::{ChartBackend, SpecChartBackend};
use crate::report::components::{
    BuildContext, CaseStudies, Conclusions, KeyFindings, Methodology, PublisherComparison,
    PublisherPerformance, ReportComponent,
};
use crate::report::schema::ReportSchema;
use crate::report::scratch::ScratchDir;

/// The component set in build order.
pub fn default_components(config: &ReportConfig) -> Vec<Box<dyn ReportComponent>> {
    vec![
        Box::new(Methodology),
        Box::new(CaseStudies {
            examples_per_case: config.examples_per_case,
            include_rating_buckets: config.include_rating_buckets,
        }),
        Box::new(PublisherPerformance),
        Box::new(PublisherComparison),
        Box::new(Conclusions),
        Box::new(KeyFindings),
    ]
}

/// Owns one report run: the table, the strategy and every component.
pub struct ReportComponentFactory {
    params: QueryParameters,
    aggregator: Aggregator,
    strategy: Box<dyn NarrativeStrategy>,
    charts: Box<dyn ChartBackend>,
    scratch: ScratchDir,
    components: Vec<Box<dyn ReportComponent>>,
    log: ConversationLog,
    rng: StdRng,
    progress: Option<ProgressBar>,
}

impl ReportComponentFactory {
    /// Normalize raw rows and wire up the configured collaborators.
    pub fn initialize(
        params: QueryParameters,
        rows: Vec<RawArticle>,
        config: &Config,
    ) -> ReportResult<Self> {
        let table = ArticleTable::from_raw(rows, config.data.encoding);
        let strategy = build_strategy(&config.narrative, &params)?;
        info!("Narration via {} strategy", strategy.name());
        Self::with_parts(
            params,
            table,
            strategy,
            Box::new(SpecChartBackend),
            &config.report,
        )
    }

    /// Build from an already normalized table and explicit collaborators.
    pub fn with_parts(
        params: QueryParameters,
        mut table: ArticleTable,
        strategy: Box<dyn NarrativeStrategy>,
        charts: Box<dyn ChartBackend>,
        config: &ReportConfig,
    ) -> ReportResult<Self> {
        params.validate().map_err(ReportError::InvalidParameters)?;

        let loaded = table.len();
        table.restrict_to_window(params.start_date, params.end_date);
        if table.is_empty() {
            warn!("No articles fall inside the reporting window");
        }
        info!(
            "{} of {} articles fall between {} and {}",
            table.len(),
            loaded,
            params.start_date,
            params.end_date
        );

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            aggregator: Aggregator::new(table),
            strategy,
            charts,
            scratch: ScratchDir::new(&config.scratch_dir),
            components: default_components(config),
            log: ConversationLog::new(),
            rng,
            progress: None,
            params,
        })
    }

    /// Tick `bar` once per completed component.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Turns exchanged with the narrative backend during the last run.
    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    /// Build every component in order and merge the fragments.
    ///
    /// Any component failure aborts the run and removes the scratch directory;
    /// no partial schema is returned. On success the chart files stay in place
    /// for the caller until the next run resets them.
    pub async fn run(&mut self) -> ReportResult<ReportSchema> {
        self.scratch.reset()?;
        self.log = ConversationLog::new();

        let selected = &self.params.selected_publisher;
        if self.aggregator.table().count_for(selected) == 0 {
            return Err(ReportError::InsufficientData(format!(
                "no articles from {} between {} and {}",
                selected, self.params.start_date, self.params.end_date
            )));
        }

        let mut ctx = BuildContext {
            aggregator: &self.aggregator,
            strategy: self.strategy.as_ref(),
            log: &mut self.log,
            charts: self.charts.as_ref(),
            scratch: &self.scratch,
            params: &self.params,
            rng: &mut self.rng,
        };

        let mut schema = ReportSchema::new();
        for component in &self.components {
            info!("Building {}", component.name());
            let merged = component
                .build(&mut ctx)
                .await
                .and_then(|fragment| schema.insert(component.name(), fragment));
            if let Err(e) = merged {
                // An aborted run leaves no charts behind.
                if let Err(cleanup) = self.scratch.teardown() {
                    warn!("Failed to remove {}: {}", self.scratch.root().display(), cleanup);
                }
                return Err(e);
            }
            debug!("{} merged", component.name());

            if let Some(bar) = &self.progress {
                bar.set_message(component.name());
                bar.inc(1);
            }
        }

        info!(
            "Report assembled: {} components, {} chart files",
            schema.len(),
            self.scratch.files()?.len()
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryEncoding;
    use crate::narrative::{ExternalNarrative, TemplatedNarrative};
    use crate::report::schema::{ComponentSchema, SectionPayload};
    use crate::testing::{date, params, ScriptedCompletion};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    const FIXTURE: &str = include_str!("../../fixtures/articles.json");

    fn fixture_table() -> ArticleTable {
        let rows: Vec<RawArticle> = serde_json::from_str(FIXTURE).unwrap();
        ArticleTable::from_raw(rows, CategoryEncoding::Binary)
    }

    fn report_config(temp: &TempDir) -> ReportConfig {
        ReportConfig {
            scratch_dir: temp.path().join("tmp").display().to_string(),
            seed: Some(42),
            ..ReportConfig::default()
        }
    }

    fn ledger_params() -> QueryParameters {
        params("Daily Ledger", &["Morning Courier", "Evening Post"])
    }

    #[test]
    fn test_fixture_loads_and_normalizes() {
        let table = fixture_table();
        assert_eq!(table.len(), 12);
        assert_eq!(table.count_for("Daily Ledger"), 6);

        let untitled = table.records().iter().find(|r| r.id == "303").unwrap();
        assert_eq!(untitled.topics, vec!["Unknown"]);
        let festival = table.records().iter().find(|r| r.id == "105").unwrap();
        assert_eq!(festival.location, "Unknown");
    }

    #[test]
    fn test_initialize_rejects_invalid_parameters() {
        let temp = TempDir::new().unwrap();
        let mut bad = ledger_params();
        bad.start_date = date(2025, 1, 1);

        let result = ReportComponentFactory::with_parts(
            bad,
            fixture_table(),
            Box::new(TemplatedNarrative::new("Daily Ledger")),
            Box::new(SpecChartBackend),
            &report_config(&temp),
        );
        assert!(matches!(result, Err(ReportError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_templated_run_assembles_all_components() {
        let temp = TempDir::new().unwrap();
        let mut factory = ReportComponentFactory::with_parts(
            ledger_params(),
            fixture_table(),
            Box::new(TemplatedNarrative::new("Daily Ledger")),
            Box::new(SpecChartBackend),
            &report_config(&temp),
        )
        .unwrap();

        let schema = factory.run().await.unwrap();
        let names: Vec<&str> = schema.components().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "Methodology",
                "Case Studies",
                "Publisher Performance Overview",
                "Publisher Comparison",
                "Conclusions",
                "Key Findings"
            ]
        );
        assert_eq!(names, factory.component_names());

        // Four performance charts and two odds charts.
        assert_eq!(factory.scratch().files().unwrap().len(), 6);
        assert!(factory.conversation().is_empty());

        let Some(ComponentSchema::Text { text, .. }) = schema.get("Key Findings") else {
            panic!("expected text component");
        };
        assert!(text.contains("3 of 5 articles from Daily Ledger are Biased or Very Biased"));

        let cases = schema.get("Case Studies").unwrap();
        let Some(SectionPayload::CaseStudies(entries)) = cases.section("Very Biased") else {
            panic!("expected case studies");
        };
        assert_eq!(entries[0].title, "Council row over new prayer room");

        let json: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
        assert!(json["Publisher Comparison"]["tendency_bias_rating"]["chart_filepath"]
            .as_str()
            .unwrap()
            .ends_with("tendency_bias_rating.json"));
    }

    #[tokio::test]
    async fn test_run_without_selected_rows_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let config = report_config(&temp);
        std::fs::create_dir_all(&config.scratch_dir).unwrap();
        std::fs::write(temp.path().join("tmp").join("stale.json"), "{}").unwrap();

        let mut window = params("Daily Ledger", &[]);
        window.start_date = date(2022, 1, 1);
        window.end_date = date(2022, 12, 31);

        let backend = ScriptedCompletion::new(vec![]);
        let calls = backend.call_counter();
        let mut factory = ReportComponentFactory::with_parts(
            window,
            fixture_table(),
            Box::new(ExternalNarrative::new(
                Box::new(backend),
                "Daily Ledger",
                Duration::from_secs(5),
            )),
            Box::new(SpecChartBackend),
            &config,
        )
        .unwrap();

        let err = factory.run().await.unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(factory.scratch().root().is_dir());
        assert!(factory.scratch().files().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_run() {
        let temp = TempDir::new().unwrap();
        let mut factory = ReportComponentFactory::with_parts(
            ledger_params(),
            fixture_table(),
            Box::new(ExternalNarrative::new(
                Box::new(ScriptedCompletion::failing("connection refused")),
                "Daily Ledger",
                Duration::from_secs(5),
            )),
            Box::new(SpecChartBackend),
            &report_config(&temp),
        )
        .unwrap();

        let err = factory.run().await.unwrap_err();
        assert!(matches!(err, ReportError::NarrativeBackend(_)));
        assert!(!factory.scratch().root().exists());
    }

    #[tokio::test]
    async fn test_missing_comparison_group_fails_tendency() {
        let temp = TempDir::new().unwrap();
        let mut factory = ReportComponentFactory::with_parts(
            params("Daily Ledger", &[]),
            fixture_table(),
            Box::new(TemplatedNarrative::new("Daily Ledger")),
            Box::new(SpecChartBackend),
            &report_config(&temp),
        )
        .unwrap();

        let err = factory.run().await.unwrap_err();
        assert!(err.is_insufficient_data());
        // Performance charts were written before the comparison failed.
        assert!(!factory.scratch().root().exists());
        assert!(factory.scratch().files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_external_run_keeps_conversation_order() {
        let temp = TempDir::new().unwrap();
        let mut config = report_config(&temp);
        config.include_rating_buckets = false;

        let backend = ScriptedCompletion::new(vec!["[Methodology]\n- Articles were rated"]);
        let calls = backend.call_counter();
        let mut factory = ReportComponentFactory::with_parts(
            ledger_params(),
            fixture_table(),
            Box::new(ExternalNarrative::new(
                Box::new(backend),
                "Daily Ledger",
                Duration::from_secs(5),
            )),
            Box::new(SpecChartBackend),
            &config,
        )
        .unwrap();

        let schema = factory.run().await.unwrap();
        assert_eq!(
            schema.get("Methodology"),
            Some(&ComponentSchema::Text {
                title: "Methodology".to_string(),
                text: "Articles were rated".to_string(),
            })
        );

        // Methodology, five case studies, four charts, two odds charts, two closing texts.
        let expected_calls = 1 + 5 + 4 + 2 + 2;
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
        assert_eq!(factory.conversation().len(), 1 + 2 * expected_calls);

        let prompts: Vec<&str> = factory.conversation().prompts().collect();
        assert!(prompts[0].starts_with("[METHODOLOGY]"));
    }
}
