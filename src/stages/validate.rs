//! Stage 6: score the translated tree for quality and structural fidelity.

use crate::batch::run_batches;
use crate::checkpoint::{CheckpointStore, Stage};
use crate::config::Config;
use crate::diff::{self, StructureReport};
use crate::lang::Language;
use crate::llm::{length_ratio_score, LlmClient, ScorePair};
use crate::paths::flatten;
use crate::prompts;
use crate::stages::record_exchange;
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

/// Quality verdict for one translated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDetail {
    pub path: String,
    pub original: String,
    pub translation: String,
    pub score: f64,
}

/// Validation outcome for one (file, language) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub language: String,
    pub quality_score: f64,
    pub structure: StructureReport,
    pub details: Vec<QualityDetail>,
}

/// Language code -> validation report for one file.
pub type ValidationResults = BTreeMap<String, ValidationReport>;

#[derive(Deserialize)]
struct ScoreResponse {
    scores: Vec<f64>,
}

fn parse_scores(response: &str, pairs: &[ScorePair]) -> Result<Vec<f64>> {
    let parsed: ScoreResponse =
        serde_json::from_str(response).context("parsing quality score response")?;
    Ok(parsed
        .scores
        .into_iter()
        .zip(pairs)
        .map(|(score, _)| score.clamp(0.0, 100.0))
        .collect())
}

/// Pair up the string leaves of both trees by flattened path. Paths present
/// in only one tree are structural problems and already counted by the
/// structural comparison, so they carry no quality score.
fn extract_pairs(original: &Value, translated: &Value) -> Vec<(String, ScorePair)> {
    let original_strings = flatten(original);
    let translated_strings = flatten(translated);
    original_strings
        .into_iter()
        .filter_map(|(path, source)| {
            translated_strings.get(&path).map(|translation| {
                (
                    path,
                    ScorePair {
                        original: source,
                        translation: translation.clone(),
                    },
                )
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validate a translated tree, or load the checkpoint. A tree with no
/// string pairs to compare scores a perfect 100.
pub async fn run(
    store: &CheckpointStore,
    filename: &str,
    language: &Language,
    original: &Value,
    translated: &Value,
    client: &LlmClient,
    config: &Config,
    ledger: &Mutex<UsageLedger>,
) -> Result<ValidationReport> {
    let code = language.code();
    if store.exists(Stage::Validated, filename, Some(code)) {
        info!("Validation checkpoint found for {filename} [{code}], skipping");
        return store.load(Stage::Validated, filename, Some(code));
    }

    let structure = diff::compare(original, translated);
    let (paths, pairs): (Vec<String>, Vec<ScorePair>) =
        extract_pairs(original, translated).into_iter().unzip();

    let scores = run_batches(
        &pairs,
        config.batch_size,
        |chunk: Vec<ScorePair>| async move {
            let request = prompts::score_request(chunk.clone(), language)?;
            let response = client.complete(&request, &config.validation_model).await?;
            record_exchange(ledger, &config.validation_model, &request.user, &response);
            parse_scores(&response, &chunk)
        },
        // Fallback scoring from string length ratio alone.
        |pair| length_ratio_score(&pair.original, &pair.translation),
    )
    .await;

    let quality_score = if scores.is_empty() {
        100.0
    } else {
        round2(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let details: Vec<QualityDetail> = paths
        .into_iter()
        .zip(pairs)
        .zip(&scores)
        .map(|((path, pair), score)| QualityDetail {
            path,
            original: pair.original,
            translation: pair.translation,
            score: *score,
        })
        .collect();

    let report = ValidationReport {
        language: code.to_string(),
        quality_score,
        structure,
        details,
    };

    info!(
        "Validated {filename} [{code}]: quality {:.2}, structure {:.2}",
        report.quality_score, report.structure.score
    );
    store.save(Stage::Validated, filename, Some(code), &report)?;
    Ok(report)
}
