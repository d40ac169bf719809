//! Completion collaborator: a real chat-completions backend and a
//! deterministic mock behind one interface.
//!
//! Every stage builds a [`CompletionRequest`] carrying both the rendered
//! prompts and the structured payload those prompts were rendered from. The
//! real backend only sends the prompts; the mock reads the payload and
//! synthesizes a response in the same wire shape the real model is asked
//! for, so both backends exercise identical parsing downstream.

use crate::retry::{with_retry_if, RetryConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// One item of a selection batch: the source string and its candidates.
#[derive(Debug, Clone, Serialize)]
pub struct SelectItem {
    pub original: String,
    pub options: Vec<String>,
}

/// One item of a refinement batch.
#[derive(Debug, Clone, Serialize)]
pub struct RefineItem {
    pub original: String,
    pub translation: String,
}

/// One original/translation pair to be quality-scored.
#[derive(Debug, Clone, Serialize)]
pub struct ScorePair {
    pub original: String,
    pub translation: String,
}

/// Structured form of a stage request, used by the mock backend to produce
/// a stage-appropriate response.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Options {
        texts: Vec<String>,
        options_count: usize,
    },
    Select {
        items: Vec<SelectItem>,
    },
    Refine {
        items: Vec<RefineItem>,
    },
    Score {
        pairs: Vec<ScorePair>,
    },
}

/// A fully rendered completion request for one batch.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub payload: RequestPayload,
}

/// The single collaborator seam. Stages never know which backend they talk
/// to; the mock is selected by configuration, not by conditional code paths
/// inside the stages.
#[derive(Debug, Clone)]
pub enum LlmClient {
    OpenAi(OpenAiClient),
    Mock(MockClient),
}

impl LlmClient {
    pub async fn complete(&self, request: &CompletionRequest, model: &str) -> Result<String> {
        match self {
            LlmClient::OpenAi(client) => client.complete(request, model).await,
            LlmClient::Mock(client) => Ok(client.complete(request)),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, LlmClient::Mock(_))
    }
}

// ==================== Real backend ====================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client with request pacing and predicate-gated retries.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    min_call_delay: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl OpenAiClient {
    pub fn new(api_key: String, api_url: String, min_call_delay: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
            min_call_delay,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Enforce the minimum spacing between consecutive calls.
    async fn pace(&self) {
        if self.min_call_delay.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_call_delay {
                let wait = self.min_call_delay - elapsed;
                debug!("Pacing completion call, waiting {:?}", wait);
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn complete(&self, request: &CompletionRequest, model: &str) -> Result<String> {
        self.pace().await;

        with_retry_if(
            &RetryConfig::completion(),
            "completion",
            || self.post(request, model),
            is_retryable_error,
        )
        .await
    }

    async fn post(&self, request: &CompletionRequest, model: &str) -> Result<String> {
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send completion request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Completion API error ({}): {}", status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Completion response contained no choices"))
    }
}

/// Retry rate limits, server errors, and transport failures; fail fast on
/// other client errors.
fn is_retryable_error(err: &anyhow::Error) -> bool {
    let message = err.to_string();
    if let Some(rest) = message.strip_prefix("Completion API error (") {
        if let Some(code) = rest.split(')').next().and_then(|s| s.parse::<u16>().ok()) {
            return code == 429 || code >= 500;
        }
    }
    true
}

// ==================== Mock backend ====================

/// Deterministic collaborator stub. Answers come from a fixed lexicon where
/// one exists, otherwise from the source text itself, so runs are fully
/// reproducible without network access.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    lexicon: BTreeMap<String, Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed fixed candidate translations for specific source strings.
    pub fn with_lexicon(lexicon: BTreeMap<String, Vec<String>>) -> Self {
        Self { lexicon }
    }

    /// Candidate translations for one source string, padded to `count`.
    fn candidates(&self, text: &str, count: usize) -> Vec<String> {
        let mut options: Vec<String> = match self.lexicon.get(text) {
            Some(entries) => entries.clone(),
            None => vec![text.to_string()],
        };
        for alt in 1.. {
            if options.len() >= count {
                break;
            }
            options.push(format!("{text} (alt {alt})"));
        }
        options.truncate(count.max(1));
        options
    }

    pub fn complete(&self, request: &CompletionRequest) -> String {
        let body = match &request.payload {
            RequestPayload::Options {
                texts,
                options_count,
            } => {
                let translations: Vec<Vec<String>> = texts
                    .iter()
                    .map(|text| self.candidates(text, *options_count))
                    .collect();
                json!({ "translations": translations })
            }
            RequestPayload::Select { items } => {
                let selections: Vec<String> = items
                    .iter()
                    .map(|item| {
                        item.options
                            .first()
                            .cloned()
                            .unwrap_or_else(|| item.original.clone())
                    })
                    .collect();
                json!({ "selections": selections })
            }
            RequestPayload::Refine { items } => {
                let refined: Vec<String> =
                    items.iter().map(|item| item.translation.clone()).collect();
                json!({ "refined_translations": refined })
            }
            RequestPayload::Score { pairs } => {
                let scores: Vec<f64> = pairs
                    .iter()
                    .map(|pair| length_ratio_score(&pair.original, &pair.translation))
                    .collect();
                json!({ "scores": scores })
            }
        };
        body.to_string()
    }
}

/// Heuristic quality score from string lengths alone: 100 for comparable
/// lengths, degrading toward 0 as they diverge.
pub fn length_ratio_score(original: &str, translation: &str) -> f64 {
    let len_o = original.chars().count();
    let len_t = translation.chars().count();
    if len_o == 0 && len_t == 0 {
        return 100.0;
    }
    if len_o == 0 || len_t == 0 {
        return 0.0;
    }
    let ratio = len_o.min(len_t) as f64 / len_o.max(len_t) as f64;
    (ratio * 100.0 * 100.0).round() / 100.0
}
