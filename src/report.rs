//! End-of-run summary report, written as JSON plus a small CSV.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::stages::validate::ValidationResults;
use crate::usage::UsageLedger;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
struct ScoreAccumulator {
    quality: f64,
    structure: f64,
    count: usize,
}

impl ScoreAccumulator {
    fn add(&mut self, quality: f64, structure: f64) {
        self.quality += quality;
        self.structure += structure;
        self.count += 1;
    }

    fn avg_quality(&self) -> f64 {
        round2(self.quality / self.count.max(1) as f64)
    }

    fn avg_structure(&self) -> f64 {
        round2(self.structure / self.count.max(1) as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write the run summary under the logs directory and return the JSON path.
pub fn generate_summary_report(
    store: &CheckpointStore,
    config: &Config,
    files: &BTreeMap<String, ValidationResults>,
    ledger: &UsageLedger,
) -> Result<PathBuf> {
    let mut overall = ScoreAccumulator::default();
    let mut by_language: BTreeMap<String, ScoreAccumulator> = BTreeMap::new();
    let mut by_file: BTreeMap<String, ScoreAccumulator> = BTreeMap::new();

    for (file, results) in files {
        for (code, report) in results {
            overall.add(report.quality_score, report.structure.score);
            by_language
                .entry(code.clone())
                .or_default()
                .add(report.quality_score, report.structure.score);
            by_file
                .entry(file.clone())
                .or_default()
                .add(report.quality_score, report.structure.score);
        }
    }

    let language_results: BTreeMap<&String, serde_json::Value> = by_language
        .iter()
        .map(|(code, acc)| {
            (
                code,
                json!({
                    "avg_quality_score": acc.avg_quality(),
                    "avg_structure_score": acc.avg_structure(),
                    "files": acc.count,
                }),
            )
        })
        .collect();

    let file_results: BTreeMap<&String, serde_json::Value> = by_file
        .iter()
        .map(|(file, acc)| {
            (
                file,
                json!({
                    "avg_quality_score": acc.avg_quality(),
                    "avg_structure_score": acc.avg_structure(),
                    "languages": acc.count,
                }),
            )
        })
        .collect();

    let report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "input_dir": config.input_dir.display().to_string(),
        "output_dir": config.output_dir.display().to_string(),
        "languages": config.languages.iter().map(|l| l.code()).collect::<Vec<_>>(),
        "files": files.keys().collect::<Vec<_>>(),
        "models_used": ledger.models_used(),
        "summary": {
            "total_files": files.len(),
            "total_languages": by_language.len(),
            "avg_quality_score": overall.avg_quality(),
            "avg_structure_score": overall.avg_structure(),
        },
        "language_results": language_results,
        "file_results": file_results,
    });

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let logs = store.logs_dir();
    let json_path = logs.join(format!("translation_report_{timestamp}.json"));
    let csv_path = logs.join(format!("translation_report_{timestamp}.csv"));

    std::fs::write(
        &json_path,
        serde_json::to_string_pretty(&report).context("serializing summary report")?,
    )
    .with_context(|| format!("writing summary report {}", json_path.display()))?;

    let mut csv = String::from("Category,Item,Quality Score,Structure Score\n");
    for (code, acc) in &by_language {
        csv.push_str(&format!(
            "Language,{},{:.2},{:.2}\n",
            csv_field(code),
            acc.avg_quality(),
            acc.avg_structure()
        ));
    }
    for (file, acc) in &by_file {
        csv.push_str(&format!(
            "File,{},{:.2},{:.2}\n",
            csv_field(file),
            acc.avg_quality(),
            acc.avg_structure()
        ));
    }
    std::fs::write(&csv_path, csv)
        .with_context(|| format!("writing summary report {}", csv_path.display()))?;

    info!("Summary report written to {}", json_path.display());
    Ok(json_path)
}
