//! Stage 5: write refined strings back into a copy of the original tree.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::lang::Language;
use crate::paths::set_at_path;
use crate::stages::Refinement;
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

/// Rebuild the translated tree and persist it as the final output file. The
/// final file doubles as this stage's checkpoint: when it already exists it
/// is loaded back instead of being rebuilt.
pub fn run(
    store: &CheckpointStore,
    filename: &str,
    language: &Language,
    original: &Value,
    refined: &Refinement,
    config: &Config,
) -> Result<Value> {
    let code = language.code();
    let final_path = store.final_path(code, filename);

    if final_path.exists() {
        info!("Final file already exists for {filename} [{code}], skipping reassembly");
        let text = std::fs::read_to_string(&final_path)
            .with_context(|| format!("reading final file {}", final_path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("parsing final file {}", final_path.display()));
    }

    let mut tree = original.clone();
    for (path, translation) in refined {
        set_at_path(
            &mut tree,
            path,
            Value::String(translation.clone()),
            config.path_compat,
        );
    }

    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(&tree).context("serializing translated tree")?;
    std::fs::write(&final_path, text)
        .with_context(|| format!("writing final file {}", final_path.display()))?;

    info!(
        "Reassembled {} strings into {}",
        refined.len(),
        final_path.display()
    );
    Ok(tree)
}
