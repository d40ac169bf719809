//! JSON localization pipeline.
//!
//! Translates the string leaves of JSON content files into multiple target
//! languages through six checkpointed stages: extract strings, generate
//! candidate translations, select the best candidate, refine, reassemble the
//! JSON tree, and validate the result. Every stage persists its output per
//! (file, language) so an interrupted run resumes without repeating any
//! completion calls.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod diff;
pub mod error;
pub mod lang;
pub mod llm;
pub mod paths;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod stages;
pub mod usage;

pub use checkpoint::{CheckpointStore, Stage};
pub use config::Config;
pub use lang::Language;
pub use llm::{LlmClient, MockClient, OpenAiClient};
pub use pipeline::Pipeline;
pub use stages::validate::{QualityDetail, ValidationReport, ValidationResults};
pub use stages::{OptionSet, Refinement, Selection, StringTable};
pub use usage::UsageLedger;
