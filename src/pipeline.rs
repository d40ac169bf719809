//! End-to-end orchestration: run every stage for every (file, language)
//! pair, isolating per-file failures and accounting usage across the run.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{LlmClient, MockClient, OpenAiClient};
use crate::report;
use crate::stages::validate::ValidationResults;
use crate::stages::{extract, options, reassemble, refine, select, validate};
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Result of a full directory run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Relative file path -> per-language validation reports.
    pub files: BTreeMap<String, ValidationResults>,
    /// Relative file path -> error rendering, for files that failed.
    pub failures: Vec<(String, String)>,
    pub ledger: UsageLedger,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        !self.files.is_empty() && self.failures.is_empty()
    }
}

pub struct Pipeline {
    config: Config,
    store: CheckpointStore,
    client: LlmClient,
}

impl Pipeline {
    /// Build a pipeline with the backend the configuration asks for.
    pub fn new(config: Config) -> Result<Self> {
        let client = if config.mock {
            LlmClient::Mock(MockClient::new())
        } else {
            LlmClient::OpenAi(OpenAiClient::new(
                config.api_key.clone(),
                config.api_url.clone(),
                config.min_call_delay,
            ))
        };
        Self::with_client(config, client)
    }

    /// Build a pipeline around an explicit backend.
    pub fn with_client(config: Config, client: LlmClient) -> Result<Self> {
        let store = CheckpointStore::new(&config.output_dir)?;
        Ok(Self {
            config,
            store,
            client,
        })
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run all six stages for one file across every configured language.
    pub async fn process_file(
        &self,
        path: &Path,
        ledger: &Mutex<UsageLedger>,
    ) -> Result<ValidationResults> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading input file {}", path.display()))?;
        let tree: Value = serde_json::from_str(&text).map_err(|e| PipelineError::InvalidInput {
            file: filename.clone(),
            reason: format!("not valid JSON: {e}"),
        })?;
        if !tree.is_object() {
            return Err(PipelineError::InvalidInput {
                file: filename,
                reason: "top-level value must be a JSON object".to_string(),
            }
            .into());
        }

        info!("Processing {filename}");
        let extracted = extract::run(&self.store, &filename, &tree)?;

        let mut results = ValidationResults::new();
        let language_count = self.config.languages.len();
        for (index, language) in self.config.languages.iter().enumerate() {
            info!("Translating {filename} into {language}");
            let calls_before = self.calls_so_far(ledger);

            let candidates = options::run(
                &self.store,
                &filename,
                language,
                &extracted,
                &self.client,
                &self.config,
                ledger,
            )
            .await?;
            let selection = select::run(
                &self.store,
                &filename,
                language,
                &extracted,
                &candidates,
                &self.client,
                &self.config,
                ledger,
            )
            .await?;
            let refined = refine::run(
                &self.store,
                &filename,
                language,
                &extracted,
                &selection,
                &self.client,
                &self.config,
                ledger,
            )
            .await?;
            let translated = reassemble::run(
                &self.store,
                &filename,
                language,
                &tree,
                &refined,
                &self.config,
            )?;
            let report = validate::run(
                &self.store,
                &filename,
                language,
                &tree,
                &translated,
                &self.client,
                &self.config,
                ledger,
            )
            .await?;
            results.insert(language.code().to_string(), report);

            self.cooldown(calls_before, ledger, index + 1 < language_count)
                .await;
        }

        Ok(results)
    }

    /// Rest between languages, but only when this language actually hit the
    /// real backend. Checkpoint-served languages and mock runs skip it.
    async fn cooldown(&self, calls_before: u64, ledger: &Mutex<UsageLedger>, more_work: bool) {
        if self.client.is_mock()
            || self.config.language_cooldown.is_zero()
            || !more_work
            || self.calls_so_far(ledger) == calls_before
        {
            return;
        }
        info!(
            "Cooling down for {:?} before the next language",
            self.config.language_cooldown
        );
        tokio::time::sleep(self.config.language_cooldown).await;
    }

    fn calls_so_far(&self, ledger: &Mutex<UsageLedger>) -> u64 {
        ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_calls()
    }

    /// Translate every JSON file under the input directory. Per-file errors
    /// are logged and collected; they never stop the run.
    pub async fn process_directory(&self) -> Result<RunOutcome> {
        let inputs = collect_json_files(&self.config.input_dir)?;
        if inputs.is_empty() {
            warn!(
                "No JSON files found under {}",
                self.config.input_dir.display()
            );
        }
        // Checkpoint and output keys use the basename only, so files with
        // the same name in different subdirectories would overwrite each
        // other's state.
        for name in duplicate_basenames(&inputs) {
            warn!(
                "Multiple input files named {name:?}; they will share checkpoints and output paths"
            );
        }

        let ledger = Mutex::new(UsageLedger::new());
        let mut files = BTreeMap::new();
        let mut failures = Vec::new();

        for path in &inputs {
            let key = path
                .strip_prefix(&self.config.input_dir)
                .unwrap_or(path)
                .display()
                .to_string();
            match self.process_file(path, &ledger).await {
                Ok(results) => {
                    files.insert(key, results);
                }
                Err(e) => {
                    error!("Failed to process {key}: {e:#}");
                    failures.push((key, format!("{e:#}")));
                }
            }
        }

        let ledger = ledger.into_inner().unwrap_or_else(|e| e.into_inner());
        ledger.log_summary();

        if !files.is_empty() {
            if let Err(e) = report::generate_summary_report(&self.store, &self.config, &files, &ledger)
            {
                warn!("Failed to write summary report: {e:#}");
            }
        }

        Ok(RunOutcome {
            files,
            failures,
            ledger,
        })
    }
}

/// Basenames appearing more than once across the input set.
fn duplicate_basenames(paths: &[PathBuf]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        if let Some(name) = path.file_name() {
            *counts.entry(name.to_string_lossy().into_owned()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect()
}

/// Recursively gather `.json` files, sorted for deterministic processing.
fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_into(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_into(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry under {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_into(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_json_files_recurses_and_sorts() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("b.json"), "{}").expect("write");
        std::fs::write(dir.path().join("a.json"), "{}").expect("write");
        std::fs::write(dir.path().join("nested/c.json"), "{}").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");

        let files = collect_json_files(dir.path()).expect("collect");
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "nested/c.json"]);
    }

    #[test]
    fn test_collect_json_files_missing_dir_errors() {
        assert!(collect_json_files(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_duplicate_basenames_flags_colliding_inputs() {
        let paths = vec![
            PathBuf::from("input/a.json"),
            PathBuf::from("input/nested/a.json"),
            PathBuf::from("input/b.json"),
        ];
        assert_eq!(duplicate_basenames(&paths), vec!["a.json"]);
    }

    #[test]
    fn test_duplicate_basenames_empty_when_unique() {
        let paths = vec![
            PathBuf::from("input/a.json"),
            PathBuf::from("input/nested/b.json"),
        ];
        assert!(duplicate_basenames(&paths).is_empty());
    }
}
