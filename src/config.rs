//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.briefpack.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::CategoryEncoding;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".briefpack.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Narration settings.
    #[serde(default)]
    pub narrative: NarrativeConfig,

    /// Report assembly settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Input table settings.
    #[serde(default)]
    pub data: DataConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "briefing_pack.json".to_string()
}

/// Which narrative strategy writes the report text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeMode {
    /// Fixed text templates, no external calls
    #[default]
    Templated,
    /// Ollama chat completion
    External,
}

/// Narration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub mode: NarrativeMode,

    /// Ollama model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Deadline for one narration call, in seconds.
    #[serde(default = "default_deadline")]
    pub deadline_seconds: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            mode: NarrativeMode::default(),
            model: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            deadline_seconds: default_deadline(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_deadline() -> u64 {
    120
}

/// Report assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory holding chart files for one run; cleared at run start.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Articles selected per case study.
    #[serde(default = "default_examples_per_case")]
    pub examples_per_case: usize,

    /// Include the Very Biased and Biased case-study buckets.
    #[serde(default = "default_true")]
    pub include_rating_buckets: bool,

    /// Seed for case-study sampling; OS entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            examples_per_case: default_examples_per_case(),
            include_rating_buckets: true,
            seed: None,
        }
    }
}

fn default_scratch_dir() -> String {
    "tmp".to_string()
}

fn default_examples_per_case() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Input table settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Representation of the five category columns.
    #[serde(default)]
    pub encoding: CategoryEncoding,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly supplied arguments override file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(mode) = args.narrative {
            self.narrative.mode = mode;
        }
        if let Some(ref model) = args.model {
            self.narrative.model = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.narrative.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.narrative.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.narrative.deadline_seconds = timeout;
        }

        if let Some(ref dir) = args.scratch_dir {
            self.report.scratch_dir = dir.display().to_string();
        }
        if let Some(n) = args.examples_per_case {
            self.report.examples_per_case = n;
        }
        if args.no_rating_buckets {
            self.report.include_rating_buckets = false;
        }
        if args.seed.is_some() {
            self.report.seed = args.seed;
        }

        if let Some(encoding) = args.encoding {
            self.data.encoding = encoding;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.narrative.mode, NarrativeMode::Templated);
        assert_eq!(config.narrative.model, "llama3.2:latest");
        assert_eq!(config.report.scratch_dir, "tmp");
        assert_eq!(config.report.examples_per_case, 1);
        assert!(config.report.include_rating_buckets);
        assert_eq!(config.data.encoding, CategoryEncoding::Binary);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "pack.json"
verbose = true

[narrative]
mode = "external"
model = "mistral:7b"
deadline_seconds = 30

[report]
examples_per_case = 3
include_rating_buckets = false
seed = 42

[data]
encoding = "ordinal"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "pack.json");
        assert!(config.general.verbose);
        assert_eq!(config.narrative.mode, NarrativeMode::External);
        assert_eq!(config.narrative.model, "mistral:7b");
        assert_eq!(config.narrative.ollama_url, "http://localhost:11434");
        assert_eq!(config.narrative.deadline_seconds, 30);
        assert_eq!(config.report.examples_per_case, 3);
        assert!(!config.report.include_rating_buckets);
        assert_eq!(config.report.seed, Some(42));
        assert_eq!(config.report.scratch_dir, "tmp");
        assert_eq!(config.data.encoding, CategoryEncoding::Ordinal);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[narrative]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[data]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.report.seed, None);
    }
}
