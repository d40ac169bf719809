//! Stage 1: flatten the string leaves of a source tree.

use crate::checkpoint::{CheckpointStore, Stage};
use crate::paths::flatten;
use crate::stages::StringTable;
use anyhow::Result;
use serde_json::Value;
use tracing::info;

/// Extract every string leaf of `tree` into a path-keyed table, or load the
/// existing checkpoint. Extraction is language-independent so the checkpoint
/// carries no language code.
pub fn run(store: &CheckpointStore, filename: &str, tree: &Value) -> Result<StringTable> {
    if store.exists(Stage::Extracted, filename, None) {
        info!("Extraction checkpoint found for {filename}, skipping");
        return store.load(Stage::Extracted, filename, None);
    }

    let extracted = flatten(tree);
    info!("Extracted {} strings from {filename}", extracted.len());
    store.save(Stage::Extracted, filename, None, &extracted)?;
    Ok(extracted)
}
