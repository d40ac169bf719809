use crate::lang::Language;
use crate::paths::PathCompat;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Read a duration in seconds from an env var. Unparseable, negative, or
/// non-finite values fall back to the default instead of poisoning
/// `Duration` construction.
fn seconds_from_env(var: &str, default: f64) -> Duration {
    let secs = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default);
    Duration::from_secs_f64(secs)
}

#[derive(Debug, Clone)]
pub struct Config {
    // Input/output
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub languages: Vec<Language>,

    // Pipeline tuning
    pub options_count: usize,
    pub batch_size: usize,

    // Models, one per completion-backed stage
    pub options_model: String,
    pub selection_model: String,
    pub refinement_model: String,
    pub validation_model: String,

    // Completion backend
    pub api_key: String,
    pub api_url: String,
    pub min_call_delay: Duration,
    pub language_cooldown: Duration,
    pub mock: bool,

    // Prompt enrichment
    pub project_description: Option<String>,

    // Path semantics
    pub path_compat: PathCompat,
}

impl Config {
    /// Environment-sourced defaults. CLI flags override these afterwards.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            languages: Vec::new(),

            options_count: 3,
            batch_size: 20,

            options_model: std::env::var("OPTIONS_MODEL").unwrap_or_else(|_| "o1".to_string()),
            selection_model: std::env::var("SELECTION_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            refinement_model: std::env::var("REFINEMENT_MODEL")
                .unwrap_or_else(|_| "o1".to_string()),
            validation_model: std::env::var("VALIDATION_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),

            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            min_call_delay: seconds_from_env("MIN_DELAY", 0.5),
            language_cooldown: Duration::from_secs(
                std::env::var("LANGUAGE_COOLDOWN_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            ),
            mock: false,

            project_description: None,

            path_compat: PathCompat::default(),
        })
    }

    /// Validate the parts of the configuration that fail fast: the input
    /// directory must exist, the tuning knobs must be sane, and a real run
    /// needs an API key.
    pub fn preflight(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            anyhow::bail!(
                "Input directory does not exist: {}",
                self.input_dir.display()
            );
        }
        if self.languages.is_empty() {
            anyhow::bail!("At least one target language is required");
        }
        if self.options_count == 0 {
            anyhow::bail!("options_count must be >= 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be >= 1");
        }
        if !self.mock && self.api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is required unless running with --mock");
        }
        Ok(())
    }
}
