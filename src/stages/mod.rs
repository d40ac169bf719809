//! The six pipeline stages.
//!
//! Each completion-backed stage follows the same shape: check the checkpoint
//! and return early on a hit, otherwise batch the work through the
//! collaborator, reconcile the response, persist the result, and return it.
//! Stage outputs are keyed by flattened path so every later stage can line
//! its input up with extraction order.

pub mod extract;
pub mod options;
pub mod refine;
pub mod reassemble;
pub mod select;
pub mod validate;

use crate::usage::UsageLedger;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Flattened path -> source string.
pub type StringTable = BTreeMap<String, String>;

/// Flattened path -> candidate translations.
pub type OptionSet = BTreeMap<String, Vec<String>>;

/// Flattened path -> chosen translation.
pub type Selection = BTreeMap<String, String>;

/// Flattened path -> refined translation.
pub type Refinement = BTreeMap<String, String>;

/// Shared usage accounting for batch workers. Locking recovers from
/// poisoning since the ledger is plain counters.
pub(crate) fn record_exchange(
    ledger: &Mutex<UsageLedger>,
    model: &str,
    prompt: &str,
    response: &str,
) {
    let mut guard = ledger.lock().unwrap_or_else(|e| e.into_inner());
    guard.record_exchange(model, prompt, response);
}
