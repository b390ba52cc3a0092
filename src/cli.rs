//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{GeneralConfig, NarrativeMode};
use crate::models::{CategoryEncoding, QueryParameters};

/// Briefpack - media-bias briefing packs from rated article tables
///
/// Aggregates bias ratings and categories for one publisher, compares it
/// against other publishers with odds ratios, and assembles a narrated
/// report schema with chart specifications.
///
/// Examples:
///   briefpack --articles fixtures/articles.json --publisher "Daily Ledger" \
///       --compare "Morning Courier,Evening Post" --start 2024-01-01 --end 2024-12-31
///   briefpack --articles rows.json --publisher X --start 2024-01-01 --end 2024-06-30 \
///       --narrative external --model llama3.2:latest --format markdown
///   briefpack --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file holding the article table (an array of rows)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub articles: Option<PathBuf>,

    /// Publisher the report is about
    #[arg(short, long, value_name = "NAME", required_unless_present = "init_config")]
    pub publisher: Option<String>,

    /// Publishers pooled as "Others" for comparison (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub compare: Vec<String>,

    /// First publish date included (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", required_unless_present = "init_config")]
    pub start: Option<NaiveDate>,

    /// Last publish date included (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", required_unless_present = "init_config")]
    pub end: Option<NaiveDate>,

    /// Bias categories of interest (comma-separated)
    #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
    pub bias_category: Vec<String>,

    /// Topics of interest (comma-separated)
    #[arg(long, value_name = "TOPICS", value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Narrative strategy
    #[arg(long, value_name = "MODE")]
    pub narrative: Option<NarrativeMode>,

    /// Ollama model used by the external narrative
    #[arg(short, long, env = "BRIEFPACK_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for generated narration (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Deadline for one narration call, in seconds
    ///
    /// A narration that misses its deadline leaves its subsection text empty.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for chart files (cleared at the start of every run)
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Articles selected per case study
    #[arg(long, value_name = "COUNT")]
    pub examples_per_case: Option<usize>,

    /// Leave out the Very Biased and Biased case-study buckets
    #[arg(long)]
    pub no_rating_buckets: bool,

    /// Seed for case-study sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Representation of the bias category columns
    #[arg(long, value_name = "ENCODING")]
    pub encoding: Option<CategoryEncoding>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .briefpack.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .briefpack.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Report schema as JSON (default)
    #[default]
    Json,
    /// Human-readable preview
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(format!("Start date {} is after end date {}", start, end));
            }
        }

        if let Some(ref publisher) = self.publisher {
            if publisher.trim().is_empty() {
                return Err("Publisher must not be empty".to_string());
            }
            if self.compare.iter().any(|p| p == publisher) {
                return Err(format!(
                    "Publisher '{}' cannot also be in --compare",
                    publisher
                ));
            }
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.examples_per_case == Some(0) {
            return Err("Examples per case must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref path) = self.articles {
            if !path.is_file() {
                return Err(format!("Articles file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Query parameters described by the arguments.
    ///
    /// `None` when a required argument is missing (only with `--init-config`).
    pub fn query_parameters(&self) -> Option<QueryParameters> {
        Some(QueryParameters {
            selected_publisher: self.publisher.clone()?,
            compared_publishers: self.compare.clone(),
            start_date: self.start?,
            end_date: self.end?,
            bias_category: self.bias_category.clone(),
            topics: self.topics.clone(),
        })
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a config file that enables verbose output.
    pub fn log_level(&self, general: &GeneralConfig) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
