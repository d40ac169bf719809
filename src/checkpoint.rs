//! Per-stage, per-(file, language) checkpoint persistence.
//!
//! Every stage result is written as one JSON file under the output
//! directory; existence of that file means "already done". Stages must check
//! `exists` before computing so that resumed runs perform zero completion
//! calls for finished work. There is no locking: a single writer per key is
//! assumed.

use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Checkpointed pipeline stages. Reassembled output is not listed here: its
/// checkpoint is the final translated file itself, addressed via
/// [`CheckpointStore::final_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracted,
    Options,
    Selected,
    Refined,
    Validated,
}

impl Stage {
    fn dir(self) -> &'static str {
        match self {
            Stage::Extracted => "extracted",
            Stage::Options => "options",
            Stage::Selected => "selected",
            Stage::Refined => "refined",
            Stage::Validated => "validated",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Stage::Extracted => "extracted",
            Stage::Options => "options",
            Stage::Selected => "selected",
            Stage::Refined => "refined",
            Stage::Validated => "validation",
        }
    }
}

/// File-per-unit-of-work checkpoint store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    /// Create the store, eagerly creating the stage directories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store = Self { root };
        for dir in [
            store.root.clone(),
            store.root.join("extracted"),
            store.root.join("options"),
            store.root.join("selected"),
            store.root.join("refined"),
            store.root.join("validated"),
            store.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| PipelineError::Checkpoint {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Path of the final translated file for (filename, language code).
    pub fn final_path(&self, language_code: &str, filename: &str) -> PathBuf {
        self.root.join(language_code).join(filename)
    }

    /// Checkpoint path for a stage key. Extraction carries no language.
    /// Keys use the file basename only, so inputs must not reuse a name
    /// across subdirectories.
    pub fn checkpoint_path(
        &self,
        stage: Stage,
        filename: &str,
        language_code: Option<&str>,
    ) -> PathBuf {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let name = match language_code {
            Some(code) => format!("{stem}_{code}_{}.json", stage.suffix()),
            None => format!("{stem}_{}.json", stage.suffix()),
        };
        self.root.join(stage.dir()).join(name)
    }

    pub fn exists(&self, stage: Stage, filename: &str, language_code: Option<&str>) -> bool {
        self.checkpoint_path(stage, filename, language_code).exists()
    }

    /// Load a previously persisted stage result.
    pub fn load<T: DeserializeOwned>(
        &self,
        stage: Stage,
        filename: &str,
        language_code: Option<&str>,
    ) -> Result<T> {
        let path = self.checkpoint_path(stage, filename, language_code);
        let text = std::fs::read_to_string(&path).map_err(|source| PipelineError::Checkpoint {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text)
            .with_context(|| format!("corrupt checkpoint at {}", path.display()))
    }

    /// Persist a stage result. The write is fatal on failure; earlier
    /// checkpoints stay valid for the next run.
    pub fn save<T: Serialize>(
        &self,
        stage: Stage,
        filename: &str,
        language_code: Option<&str>,
        value: &T,
    ) -> Result<()> {
        let path = self.checkpoint_path(stage, filename, language_code);
        let text = serde_json::to_string_pretty(value)
            .with_context(|| format!("serializing checkpoint for {}", path.display()))?;
        std::fs::write(&path, text).map_err(|source| PipelineError::Checkpoint {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }
}
