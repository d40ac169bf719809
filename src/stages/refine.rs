//! Stage 4: polish the selected translations.

use crate::batch::run_batches;
use crate::checkpoint::{CheckpointStore, Stage};
use crate::config::Config;
use crate::lang::Language;
use crate::llm::{LlmClient, RefineItem};
use crate::prompts;
use crate::stages::{record_exchange, Refinement, Selection, StringTable};
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// Models answer the refinement prompt in a few shapes: a plain string, or
/// an object tagging the string under one of a handful of keys. All of them
/// decode to the refined string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RefinedEntry {
    Plain(String),
    Tagged(TaggedEntry),
    Other(serde_json::Value),
}

#[derive(Deserialize)]
struct TaggedEntry {
    #[serde(alias = "refined", alias = "refined_translation")]
    translation: String,
}

#[derive(Deserialize)]
struct RefineResponse {
    refined_translations: Vec<RefinedEntry>,
}

/// Decode one response entry, keeping the current translation when the
/// entry is unusable.
fn decode_entry(entry: RefinedEntry, current: &str) -> String {
    match entry {
        RefinedEntry::Plain(text) => text,
        RefinedEntry::Tagged(tagged) => tagged.translation,
        RefinedEntry::Other(value) => {
            warn!(
                "Unrecognized refinement entry {value}, keeping the selected translation"
            );
            current.to_string()
        }
    }
}

fn parse_refinements(response: &str, items: &[RefineItem]) -> Result<Vec<String>> {
    let parsed: RefineResponse =
        serde_json::from_str(response).context("parsing refinement response")?;
    Ok(parsed
        .refined_translations
        .into_iter()
        .zip(items)
        .map(|(entry, item)| decode_entry(entry, &item.translation))
        .collect())
}

/// Refine each selected translation, or load the checkpoint. Fallback for
/// an unrefinable item is its selected translation unchanged.
pub async fn run(
    store: &CheckpointStore,
    filename: &str,
    language: &Language,
    extracted: &StringTable,
    selection: &Selection,
    client: &LlmClient,
    config: &Config,
    ledger: &Mutex<UsageLedger>,
) -> Result<Refinement> {
    let code = language.code();
    if store.exists(Stage::Refined, filename, Some(code)) {
        info!("Refinement checkpoint found for {filename} [{code}], skipping");
        return store.load(Stage::Refined, filename, Some(code));
    }

    let paths: Vec<&String> = selection.keys().collect();
    let items: Vec<RefineItem> = selection
        .iter()
        .map(|(path, translation)| RefineItem {
            original: extracted.get(path).cloned().unwrap_or_default(),
            translation: translation.clone(),
        })
        .collect();

    let refined = run_batches(
        &items,
        config.batch_size,
        |chunk: Vec<RefineItem>| async move {
            let request = prompts::refine_request(
                chunk.clone(),
                language,
                config.project_description.as_deref(),
            )?;
            let response = client.complete(&request, &config.refinement_model).await?;
            record_exchange(ledger, &config.refinement_model, &request.user, &response);
            parse_refinements(&response, &chunk)
        },
        |item| item.translation.clone(),
    )
    .await;

    let refinement: Refinement = paths.into_iter().cloned().zip(refined).collect();

    info!(
        "Refined {} translations in {filename} [{code}]",
        refinement.len()
    );
    store.save(Stage::Refined, filename, Some(code), &refinement)?;
    Ok(refinement)
}
