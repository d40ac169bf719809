use std::path::PathBuf;
use thiserror::Error;

/// Fatal error classes the orchestrator distinguishes.
///
/// Collaborator faults (bad shapes, transport errors) never surface here;
/// they are recovered inside the stages via reconciliation and fallbacks.
/// These variants abort the current file's run while leaving prior
/// checkpoints valid for the next attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file could not be used at all (unreadable, malformed JSON,
    /// or a non-object root).
    #[error("invalid input {file}: {reason}")]
    InvalidInput { file: String, reason: String },

    /// A checkpoint read or write failed (permissions, disk full).
    #[error("checkpoint I/O failure at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
