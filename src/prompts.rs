//! Prompt construction for each pipeline stage.
//!
//! Prompts always demand a JSON object response with a fixed top-level key
//! so responses can be parsed mechanically. The structured items are
//! embedded pretty-printed, and the same items travel alongside the prompt
//! in the request payload for the mock backend.

use crate::lang::Language;
use crate::llm::{CompletionRequest, RefineItem, RequestPayload, ScorePair, SelectItem};
use anyhow::{Context, Result};

fn project_note(project_context: Option<&str>) -> String {
    match project_context {
        Some(description) if !description.trim().is_empty() => {
            format!("\nProject context: {}\n", description.trim())
        }
        _ => String::new(),
    }
}

/// Stage 2: ask for `options_count` candidate translations per source text.
pub fn options_request(
    texts: Vec<String>,
    options_count: usize,
    language: &Language,
    project_context: Option<&str>,
) -> Result<CompletionRequest> {
    let system = format!(
        "You are a professional translator producing UI copy in {}.{}",
        language.name(),
        project_note(project_context)
    );
    let rendered =
        serde_json::to_string_pretty(&texts).context("serializing option request texts")?;
    let user = format!(
        "For each source text below, produce exactly {options_count} distinct translation \
         options in {}. Respond with a JSON object {{\"translations\": [[...], ...]}} where \
         the outer array has one entry per source text, in order, and each inner array has \
         exactly {options_count} strings.\n\nSource texts:\n{rendered}",
        language.name()
    );
    Ok(CompletionRequest {
        system,
        user,
        payload: RequestPayload::Options {
            texts,
            options_count,
        },
    })
}

/// Stage 3: ask for the best candidate per item.
pub fn select_request(
    items: Vec<SelectItem>,
    language: &Language,
    project_context: Option<&str>,
) -> Result<CompletionRequest> {
    let system = format!(
        "You are a translation reviewer choosing the most natural {} phrasing.{}",
        language.name(),
        project_note(project_context)
    );
    let rendered =
        serde_json::to_string_pretty(&items).context("serializing selection items")?;
    let user = format!(
        "Select the best translation for each item below. Respond with a JSON object \
         {{\"selections\": [...]}} containing exactly one chosen string per item, in order. \
         Every selection must be copied verbatim from that item's options.\n\nItems:\n{rendered}"
    );
    Ok(CompletionRequest {
        system,
        user,
        payload: RequestPayload::Select { items },
    })
}

/// Stage 4: ask for a polished version of each selected translation.
pub fn refine_request(
    items: Vec<RefineItem>,
    language: &Language,
    project_context: Option<&str>,
) -> Result<CompletionRequest> {
    let system = format!(
        "You are a translation editor polishing {} UI copy for fluency and consistency.{}",
        language.name(),
        project_note(project_context)
    );
    let rendered =
        serde_json::to_string_pretty(&items).context("serializing refinement items")?;
    let user = format!(
        "Refine each translation below, keeping its meaning and any placeholders intact. \
         Respond with a JSON object {{\"refined_translations\": [...]}} containing exactly \
         one string per item, in order.\n\nItems:\n{rendered}"
    );
    Ok(CompletionRequest {
        system,
        user,
        payload: RequestPayload::Refine { items },
    })
}

/// Stage 6: ask for a 0-100 quality score per pair.
pub fn score_request(pairs: Vec<ScorePair>, language: &Language) -> Result<CompletionRequest> {
    let system = format!(
        "You are a translation quality rater for {} output.",
        language.name()
    );
    let rendered = serde_json::to_string_pretty(&pairs).context("serializing score pairs")?;
    let user = format!(
        "Score the quality of each translation below from 0 to 100. Respond with a JSON \
         object {{\"scores\": [...]}} containing exactly one number per pair, in \
         order.\n\nPairs:\n{rendered}"
    );
    Ok(CompletionRequest {
        system,
        user,
        payload: RequestPayload::Score { pairs },
    })
}
