use anyhow::Result;
use clap::Parser;
use json_translator::config::Config;
use json_translator::lang::Language;
use json_translator::pipeline::Pipeline;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Translate the string leaves of JSON files into multiple languages
/// through a staged, checkpointed completion pipeline.
#[derive(Parser, Debug)]
#[command(name = "json-translator", version, about)]
struct Cli {
    /// Directory containing the source JSON files
    #[arg(long, visible_alias = "input-dir")]
    source: PathBuf,

    /// Target languages, by name or code, comma separated (e.g. "Spanish,fr,ja")
    #[arg(long, value_delimiter = ',', required = true)]
    languages: Vec<String>,

    /// Output directory for checkpoints and translated files
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Candidate translations to generate per string
    #[arg(long, default_value_t = 3)]
    options_count: usize,

    /// Strings per completion call
    #[arg(long, default_value_t = 20)]
    batch_size: usize,

    /// Model for candidate generation
    #[arg(long)]
    options_model: Option<String>,

    /// Model for candidate selection
    #[arg(long)]
    selection_model: Option<String>,

    /// Model for refinement
    #[arg(long)]
    refinement_model: Option<String>,

    /// Model for quality validation
    #[arg(long)]
    validation_model: Option<String>,

    /// Short description of the project, included in prompts for context
    #[arg(long)]
    project_description: Option<String>,

    /// Use the deterministic offline backend instead of the completion API
    #[arg(long)]
    mock: bool,

    /// Validate the configuration and input directory, then exit
    #[arg(long)]
    check_only: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Obvious placeholder keys from .env templates get mock mode rather than a
/// guaranteed authentication failure.
fn is_placeholder_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    lowered.is_empty()
        || lowered == "mock"
        || lowered == "your_api_key"
        || lowered == "your-api-key"
        || lowered.starts_with("sk-...")
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;

    config.input_dir = cli.source.clone();
    config.output_dir = cli.output.clone();
    config.languages = cli
        .languages
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Language::resolve(l))
        .collect();
    config.options_count = cli.options_count;
    config.batch_size = cli.batch_size;
    if let Some(model) = &cli.options_model {
        config.options_model = model.clone();
    }
    if let Some(model) = &cli.selection_model {
        config.selection_model = model.clone();
    }
    if let Some(model) = &cli.refinement_model {
        config.refinement_model = model.clone();
    }
    if let Some(model) = &cli.validation_model {
        config.validation_model = model.clone();
    }
    config.project_description = cli.project_description.clone();
    config.mock = cli.mock;

    config.api_key = config.api_key.trim().to_string();
    if !config.mock && is_placeholder_key(&config.api_key) {
        warn!("No usable API key configured, falling back to the mock backend");
        config.mock = true;
    }

    Ok(config)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = build_config(&cli)?;
    config.preflight()?;

    if cli.check_only {
        info!("Configuration OK");
        return Ok(0);
    }

    let pipeline = Pipeline::new(config)?;
    let outcome = pipeline.process_directory().await?;

    info!(
        "Run finished: {} file(s) translated, {} failure(s)",
        outcome.files.len(),
        outcome.failures.len()
    );
    for (file, reason) in &outcome.failures {
        error!("{file}: {reason}");
    }

    if outcome.succeeded() {
        Ok(0)
    } else {
        Ok(1)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file when present; real deployments set the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.debug {
        "json_translator=debug"
    } else {
        "json_translator=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .init();

    let code = tokio::select! {
        result = run(cli) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, checkpoints remain valid for the next run");
            130
        }
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_key_detection() {
        assert!(is_placeholder_key(""));
        assert!(is_placeholder_key("mock"));
        assert!(is_placeholder_key("YOUR_API_KEY"));
        assert!(!is_placeholder_key("sk-proj-abc123"));
    }

    #[test]
    fn test_cli_parses_comma_separated_languages() {
        let cli = Cli::parse_from([
            "json-translator",
            "--source",
            "input",
            "--languages",
            "Spanish,fr,ja",
            "--mock",
        ]);
        assert_eq!(cli.languages, vec!["Spanish", "fr", "ja"]);
        assert!(cli.mock);
        assert_eq!(cli.options_count, 3);
        assert_eq!(cli.batch_size, 20);
    }

    #[test]
    fn test_cli_input_dir_alias() {
        let cli = Cli::parse_from([
            "json-translator",
            "--input-dir",
            "content",
            "--languages",
            "de",
        ]);
        assert_eq!(cli.source, PathBuf::from("content"));
    }

    #[test]
    fn test_build_config_resolves_languages_and_models() {
        let cli = Cli::parse_from([
            "json-translator",
            "--source",
            "input",
            "--languages",
            "Spanish,German",
            "--selection-model",
            "gpt-4o-mini",
            "--mock",
        ]);
        let config = build_config(&cli).expect("config");
        let codes: Vec<&str> = config.languages.iter().map(|l| l.code()).collect();
        assert_eq!(codes, vec!["es", "de"]);
        assert_eq!(config.selection_model, "gpt-4o-mini");
        assert!(config.mock);
    }

    #[test]
    fn test_build_config_placeholder_key_forces_mock() {
        let cli = Cli::parse_from([
            "json-translator",
            "--source",
            "input",
            "--languages",
            "es",
        ]);
        let mut config = build_config(&cli).expect("config");
        // Whatever the environment holds, a placeholder never reaches a
        // real backend.
        config.api_key = "your_api_key".to_string();
        assert!(is_placeholder_key(&config.api_key));
    }
}
