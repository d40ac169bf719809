//! Stage 3: choose the best candidate translation per string.

use crate::batch::run_batches;
use crate::checkpoint::{CheckpointStore, Stage};
use crate::config::Config;
use crate::lang::Language;
use crate::llm::{LlmClient, SelectItem};
use crate::prompts;
use crate::stages::{record_exchange, OptionSet, Selection, StringTable};
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Deserialize)]
struct SelectResponse {
    selections: Vec<String>,
}

fn fallback_choice(item: &SelectItem) -> String {
    item.options
        .first()
        .cloned()
        .unwrap_or_else(|| item.original.clone())
}

/// A selection must come from the offered candidates; anything else is
/// replaced by the first candidate.
fn validate_choice(choice: String, item: &SelectItem) -> String {
    if item.options.contains(&choice) {
        choice
    } else {
        warn!(
            "Selection {:?} is not among the candidates for {:?}, using the first candidate",
            choice, item.original
        );
        fallback_choice(item)
    }
}

fn parse_selections(response: &str, items: &[SelectItem]) -> Result<Vec<String>> {
    let parsed: SelectResponse =
        serde_json::from_str(response).context("parsing selection response")?;
    Ok(parsed
        .selections
        .into_iter()
        .zip(items)
        .map(|(choice, item)| validate_choice(choice, item))
        .collect())
}

/// Pick one candidate per string, or load the checkpoint.
pub async fn run(
    store: &CheckpointStore,
    filename: &str,
    language: &Language,
    extracted: &StringTable,
    options: &OptionSet,
    client: &LlmClient,
    config: &Config,
    ledger: &Mutex<UsageLedger>,
) -> Result<Selection> {
    let code = language.code();
    if store.exists(Stage::Selected, filename, Some(code)) {
        info!("Selection checkpoint found for {filename} [{code}], skipping");
        return store.load(Stage::Selected, filename, Some(code));
    }

    let paths: Vec<&String> = options.keys().collect();
    let items: Vec<SelectItem> = options
        .iter()
        .map(|(path, candidates)| SelectItem {
            original: extracted.get(path).cloned().unwrap_or_default(),
            options: candidates.clone(),
        })
        .collect();

    let choices = run_batches(
        &items,
        config.batch_size,
        |chunk: Vec<SelectItem>| async move {
            let request = prompts::select_request(
                chunk.clone(),
                language,
                config.project_description.as_deref(),
            )?;
            let response = client.complete(&request, &config.selection_model).await?;
            record_exchange(ledger, &config.selection_model, &request.user, &response);
            parse_selections(&response, &chunk)
        },
        fallback_choice,
    )
    .await;

    let selection: Selection = paths.into_iter().cloned().zip(choices).collect();

    info!(
        "Selected translations for {} strings in {filename} [{code}]",
        selection.len()
    );
    store.save(Stage::Selected, filename, Some(code), &selection)?;
    Ok(selection)
}
