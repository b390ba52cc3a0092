//! Briefpack - media-bias briefing pack builder
//!
//! Aggregates a rated article table for one publisher, compares it with
//! other publishers and assembles a narrated report schema.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments or a failed run (nothing is written)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod narrative;
mod report;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::RawArticle;
use report::ReportComponentFactory;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        return handle_init_config();
    }

    let (mut config, source) = load_config(&args);
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("Briefpack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    if let Err(e) = run_report(args, config).await {
        error!("Report generation failed: {:#}", e);
        eprintln!("\n❌ The briefing pack could not be generated. Please try again.");
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .briefpack.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to choose the narrative mode, model and case-study sampling.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(&config.general);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the table, run every component and write the report.
async fn run_report(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let params = args
        .query_parameters()
        .context("--publisher, --start and --end are required")?;
    let articles_path = args
        .articles
        .as_deref()
        .context("--articles is required")?;

    let rows = load_articles(articles_path)?;
    println!("📥 Loaded {} articles from {}", rows.len(), articles_path.display());

    println!("🧮 Building briefing pack for {}", params.selected_publisher);
    println!("   Period: {} to {}", params.start_date, params.end_date);
    if !params.compared_publishers.is_empty() {
        println!("   Compared with: {}", params.compared_publishers.join(", "));
    }
    println!("   Narrative: {:?}", config.narrative.mode);

    let mut factory = ReportComponentFactory::initialize(params.clone(), rows, &config)?;

    let progress = (!args.quiet).then(|| component_progress(factory.component_names().len()));
    if let Some(ref bar) = progress {
        factory = factory.with_progress(bar.clone());
    }

    let result = factory.run().await;
    if let Some(ref bar) = progress {
        match &result {
            Ok(_) => bar.finish_with_message("Report assembled"),
            Err(_) => bar.abandon_with_message("Report aborted"),
        }
    }
    let schema = result?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&schema)?,
        OutputFormat::Markdown => report::generate_markdown_report(&schema, &params),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    println!("\n📊 Report Summary:");
    println!("   Components: {}", schema.len());
    println!("   Charts: {}", factory.scratch().files()?.len());
    let conversation = factory.conversation();
    if !conversation.is_empty() {
        println!("   Narration requests: {}", conversation.prompts().count());
    }
    println!("   Chart directory: {}", factory.scratch().root().display());
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Briefing pack saved to: {}", output_path.display());

    Ok(())
}

fn component_progress(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

/// Read the article table from a JSON array file.
fn load_articles(path: &Path) -> Result<Vec<RawArticle>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read articles file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse articles file: {}", path.display()))
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    File(PathBuf),
    DefaultFile,
    BuiltIn,
    Fallback(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
            ConfigSource::BuiltIn => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that cannot be read exits with an error.
fn load_config(args: &Args) -> (Config, ConfigSource) {
    if let Some(ref config_path) = args.config {
        return match Config::load(config_path) {
            Ok(config) => (config, ConfigSource::File(config_path.clone())),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        };
    }

    match Config::load_default() {
        Ok(Some(config)) => (config, ConfigSource::DefaultFile),
        Ok(None) => (Config::default(), ConfigSource::BuiltIn),
        Err(e) => (Config::default(), ConfigSource::Fallback(e)),
    }
}
