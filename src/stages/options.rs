//! Stage 2: generate candidate translations for every extracted string.

use crate::batch::run_batches;
use crate::checkpoint::{CheckpointStore, Stage};
use crate::config::Config;
use crate::lang::Language;
use crate::llm::LlmClient;
use crate::prompts;
use crate::stages::{record_exchange, OptionSet, StringTable};
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::info;

#[derive(Deserialize)]
struct OptionsResponse {
    translations: Vec<Vec<String>>,
}

/// Normalize one candidate list to exactly `count` entries: pad by
/// repeating the first candidate, truncate any excess. An empty list falls
/// back to the source text.
fn normalize_candidates(mut candidates: Vec<String>, source: &str, count: usize) -> Vec<String> {
    if candidates.is_empty() {
        return vec![source.to_string(); count];
    }
    let first = candidates[0].clone();
    while candidates.len() < count {
        candidates.push(first.clone());
    }
    candidates.truncate(count);
    candidates
}

fn parse_options(response: &str, sources: &[String], count: usize) -> Result<Vec<Vec<String>>> {
    let parsed: OptionsResponse =
        serde_json::from_str(response).context("parsing candidate translations response")?;
    Ok(parsed
        .translations
        .into_iter()
        .zip(sources)
        .map(|(candidates, source)| normalize_candidates(candidates, source, count))
        .collect())
}

/// Generate `options_count` candidates per string, or load the checkpoint.
pub async fn run(
    store: &CheckpointStore,
    filename: &str,
    language: &Language,
    extracted: &StringTable,
    client: &LlmClient,
    config: &Config,
    ledger: &Mutex<UsageLedger>,
) -> Result<OptionSet> {
    let code = language.code();
    if store.exists(Stage::Options, filename, Some(code)) {
        info!("Options checkpoint found for {filename} [{code}], skipping");
        return store.load(Stage::Options, filename, Some(code));
    }

    let paths: Vec<&String> = extracted.keys().collect();
    let texts: Vec<String> = extracted.values().cloned().collect();

    let candidates = run_batches(
        &texts,
        config.batch_size,
        |chunk: Vec<String>| async move {
            let request = prompts::options_request(
                chunk.clone(),
                config.options_count,
                language,
                config.project_description.as_deref(),
            )?;
            let response = client.complete(&request, &config.options_model).await?;
            record_exchange(ledger, &config.options_model, &request.user, &response);
            parse_options(&response, &chunk, config.options_count)
        },
        |text| vec![text.clone(); config.options_count],
    )
    .await;

    let options: OptionSet = paths
        .into_iter()
        .cloned()
        .zip(candidates)
        .collect();

    info!(
        "Generated candidates for {} strings in {filename} [{code}]",
        options.len()
    );
    store.save(Stage::Options, filename, Some(code), &options)?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockClient;
    use crate::paths::PathCompat;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            languages: vec![Language::resolve("Spanish")],
            options_count: 2,
            batch_size: 20,
            options_model: "o1".to_string(),
            selection_model: "gpt-4o".to_string(),
            refinement_model: "o1".to_string(),
            validation_model: "gpt-4o".to_string(),
            api_key: String::new(),
            api_url: String::new(),
            min_call_delay: Duration::ZERO,
            language_cooldown: Duration::ZERO,
            mock: true,
            project_description: None,
            path_compat: PathCompat::default(),
        }
    }

    fn mock_client() -> LlmClient {
        let mut lexicon = BTreeMap::new();
        lexicon.insert(
            "Hello".to_string(),
            vec!["Hola".to_string(), "Saludos".to_string()],
        );
        LlmClient::Mock(MockClient::with_lexicon(lexicon))
    }

    fn extracted() -> StringTable {
        let mut table = StringTable::new();
        table.insert("greeting".to_string(), "Hello".to_string());
        table.insert("buttons.save".to_string(), "Save".to_string());
        table
    }

    #[tokio::test]
    async fn test_generates_options_per_path() {
        let dir = TempDir::new().expect("temp dir");
        let store = CheckpointStore::new(dir.path()).expect("store");
        let config = test_config();
        let language = Language::resolve("Spanish");
        let ledger = Mutex::new(UsageLedger::new());

        let options = run(
            &store,
            "home.json",
            &language,
            &extracted(),
            &mock_client(),
            &config,
            &ledger,
        )
        .await
        .expect("options");

        assert_eq!(
            options.get("greeting"),
            Some(&vec!["Hola".to_string(), "Saludos".to_string()])
        );
        assert_eq!(options.get("buttons.save").map(Vec::len), Some(2));
        assert!(store.exists(Stage::Options, "home.json", Some("es")));
        assert!(ledger.lock().unwrap().total_calls() > 0);
    }

    #[tokio::test]
    async fn test_checkpoint_skips_completion_calls() {
        let dir = TempDir::new().expect("temp dir");
        let store = CheckpointStore::new(dir.path()).expect("store");
        let config = test_config();
        let language = Language::resolve("Spanish");
        let ledger = Mutex::new(UsageLedger::new());

        let first = run(
            &store,
            "home.json",
            &language,
            &extracted(),
            &mock_client(),
            &config,
            &ledger,
        )
        .await
        .expect("options");

        let calls_after_first = ledger.lock().unwrap().total_calls();
        let second = run(
            &store,
            "home.json",
            &language,
            &extracted(),
            &mock_client(),
            &config,
            &ledger,
        )
        .await
        .expect("options");

        assert_eq!(first, second);
        assert_eq!(ledger.lock().unwrap().total_calls(), calls_after_first);
    }

    #[test]
    fn test_normalize_pads_with_first_candidate() {
        let normalized = normalize_candidates(vec!["Hola".to_string()], "Hello", 3);
        assert_eq!(normalized, vec!["Hola", "Hola", "Hola"]);
    }

    #[test]
    fn test_normalize_truncates_excess() {
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(normalize_candidates(candidates, "x", 2), vec!["a", "b"]);
    }

    #[test]
    fn test_normalize_empty_falls_back_to_source() {
        assert_eq!(normalize_candidates(vec![], "Hello", 2), vec!["Hello", "Hello"]);
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        let sources = vec!["Hello".to_string()];
        assert!(parse_options("not json", &sources, 2).is_err());
        assert!(parse_options("{\"wrong\": []}", &sources, 2).is_err());
    }
}
