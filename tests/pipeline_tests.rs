//! End-to-end pipeline tests against the mock backend and a wiremock
//! completion server.

use json_translator::config::Config;
use json_translator::lang::Language;
use json_translator::llm::{LlmClient, MockClient, OpenAiClient};
use json_translator::paths::PathCompat;
use json_translator::pipeline::Pipeline;
use json_translator::usage::UsageLedger;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&input).expect("input dir");
    Workspace {
        _dir: dir,
        input,
        output,
    }
}

fn config(ws: &Workspace, languages: &[&str]) -> Config {
    Config {
        input_dir: ws.input.clone(),
        output_dir: ws.output.clone(),
        languages: languages.iter().map(|l| Language::resolve(l)).collect(),
        options_count: 2,
        batch_size: 20,
        options_model: "o1".to_string(),
        selection_model: "gpt-4o".to_string(),
        refinement_model: "o1".to_string(),
        validation_model: "gpt-4o".to_string(),
        api_key: String::new(),
        api_url: String::new(),
        min_call_delay: Duration::ZERO,
        language_cooldown: Duration::ZERO,
        mock: true,
        project_description: None,
        path_compat: PathCompat::default(),
    }
}

fn lexicon_client() -> LlmClient {
    let mut lexicon = BTreeMap::new();
    lexicon.insert(
        "Hello".to_string(),
        vec!["Hola".to_string(), "Saludos".to_string()],
    );
    lexicon.insert(
        "Save".to_string(),
        vec!["Guardar".to_string(), "Salvar".to_string()],
    );
    LlmClient::Mock(MockClient::with_lexicon(lexicon))
}

fn write_input(ws: &Workspace, name: &str, value: &serde_json::Value) {
    std::fs::write(
        ws.input.join(name),
        serde_json::to_string_pretty(value).expect("serialize"),
    )
    .expect("write input");
}

// ==================== Mock End-to-End Tests ====================

#[tokio::test]
async fn test_full_pipeline_with_lexicon() {
    let ws = workspace();
    write_input(
        &ws,
        "home.json",
        &json!({"greeting": "Hello", "buttons": {"save": "Save"}}),
    );

    let pipeline = Pipeline::with_client(config(&ws, &["Spanish"]), lexicon_client())
        .expect("pipeline");
    let ledger = Mutex::new(UsageLedger::new());
    let results = pipeline
        .process_file(&ws.input.join("home.json"), &ledger)
        .await
        .expect("process");

    // Validation report per language.
    let report = results.get("es").expect("es report");
    assert_eq!(report.structure.score, 100.0);
    assert!(report.structure.issues.is_empty());
    // Mock quality scores come from the length-ratio heuristic:
    // Save/Guardar = 57.14, Hello/Hola = 80.0, averaging 68.57.
    assert_eq!(report.quality_score, 68.57);
    assert_eq!(report.details.len(), 2);

    // Final file carries the first lexicon candidate for each string.
    let final_text =
        std::fs::read_to_string(ws.output.join("es").join("home.json")).expect("final file");
    let final_tree: serde_json::Value = serde_json::from_str(&final_text).expect("parse");
    assert_eq!(
        final_tree,
        json!({"greeting": "Hola", "buttons": {"save": "Guardar"}})
    );

    // Intermediate checkpoints all exist.
    for sub in [
        "extracted/home_extracted.json",
        "options/home_es_options.json",
        "selected/home_es_selected.json",
        "refined/home_es_refined.json",
        "validated/home_es_validation.json",
    ] {
        assert!(ws.output.join(sub).exists(), "missing checkpoint {sub}");
    }
}

#[tokio::test]
async fn test_candidate_and_selection_checkpoints_hold_lexicon_content() {
    let ws = workspace();
    write_input(&ws, "home.json", &json!({"greeting": "Hello"}));

    let pipeline = Pipeline::with_client(config(&ws, &["Spanish"]), lexicon_client())
        .expect("pipeline");
    let ledger = Mutex::new(UsageLedger::new());
    pipeline
        .process_file(&ws.input.join("home.json"), &ledger)
        .await
        .expect("process");

    let options_text =
        std::fs::read_to_string(ws.output.join("options/home_es_options.json")).expect("options");
    let options: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&options_text).expect("parse options");
    assert_eq!(
        options.get("greeting"),
        Some(&vec!["Hola".to_string(), "Saludos".to_string()])
    );

    let selected_text =
        std::fs::read_to_string(ws.output.join("selected/home_es_selected.json")).expect("sel");
    let selected: BTreeMap<String, String> =
        serde_json::from_str(&selected_text).expect("parse selection");
    assert_eq!(selected.get("greeting").map(String::as_str), Some("Hola"));
}

#[tokio::test]
async fn test_directory_run_multiple_files_and_languages() {
    let ws = workspace();
    write_input(&ws, "home.json", &json!({"greeting": "Hello"}));
    write_input(&ws, "menu.json", &json!({"save": "Save"}));

    let pipeline = Pipeline::with_client(config(&ws, &["Spanish", "French"]), lexicon_client())
        .expect("pipeline");
    let outcome = pipeline.process_directory().await.expect("run");

    assert!(outcome.succeeded());
    assert_eq!(outcome.files.len(), 2);
    assert!(outcome.files["home.json"].contains_key("es"));
    assert!(outcome.files["home.json"].contains_key("fr"));
    assert!(ws.output.join("fr/menu.json").exists());

    // A summary report lands in the logs directory.
    let logs: Vec<_> = std::fs::read_dir(ws.output.join("logs"))
        .expect("logs dir")
        .collect();
    assert_eq!(logs.len(), 2); // JSON + CSV
}

#[tokio::test]
async fn test_invalid_input_is_isolated_from_other_files() {
    let ws = workspace();
    write_input(&ws, "good.json", &json!({"greeting": "Hello"}));
    std::fs::write(ws.input.join("bad.json"), "[\"not\", \"an\", \"object\"]")
        .expect("write bad");

    let pipeline = Pipeline::with_client(config(&ws, &["Spanish"]), lexicon_client())
        .expect("pipeline");
    let outcome = pipeline.process_directory().await.expect("run");

    assert!(!outcome.succeeded());
    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.files.contains_key("good.json"));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, "bad.json");
    assert!(outcome.failures[0].1.contains("JSON object"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let ws = workspace();
    write_input(&ws, "home.json", &json!({"greeting": "Hello"}));

    let cfg = config(&ws, &["Spanish"]);
    let pipeline =
        Pipeline::with_client(cfg.clone(), lexicon_client()).expect("pipeline");
    let first = pipeline.process_directory().await.expect("first run");

    // Second pipeline instance over the same output directory resumes from
    // checkpoints and reproduces the same reports.
    let pipeline = Pipeline::with_client(cfg, lexicon_client()).expect("pipeline");
    let second = pipeline.process_directory().await.expect("second run");

    assert_eq!(
        first.files["home.json"]["es"],
        second.files["home.json"]["es"]
    );
    assert_eq!(second.ledger.total_calls(), 0);
}

// ==================== Resumability Against a Real Backend ====================

fn chat_response(content: serde_json::Value) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content.to_string() } }
        ]
    })
}

async fn mount_stage_mocks(server: &MockServer, expected_calls_each: u64) {
    Mock::given(method("POST"))
        .and(body_string_contains("distinct translation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            json!({"translations": [["Hola", "Saludos"]]}),
        )))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Select the best translation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            json!({"selections": ["Hola"]}),
        )))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Refine each translation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            json!({"refined_translations": ["Hola"]}),
        )))
        .expect(expected_calls_each)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Score the quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            json!({"scores": [95.0]}),
        )))
        .expect(expected_calls_each)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resumed_run_makes_no_completion_calls() {
    let ws = workspace();
    write_input(&ws, "home.json", &json!({"greeting": "Hello"}));

    let server = MockServer::start().await;
    // Each stage endpoint is called exactly once across BOTH runs: the
    // second run must be served entirely from checkpoints.
    mount_stage_mocks(&server, 1).await;

    let mut cfg = config(&ws, &["Spanish"]);
    cfg.mock = false;
    cfg.api_key = "test-key".to_string();
    cfg.api_url = server.uri();

    let client = LlmClient::OpenAi(OpenAiClient::new(
        cfg.api_key.clone(),
        cfg.api_url.clone(),
        Duration::ZERO,
    ));
    let pipeline = Pipeline::with_client(cfg.clone(), client).expect("pipeline");
    let first = pipeline.process_directory().await.expect("first run");
    assert!(first.succeeded());
    assert_eq!(first.ledger.total_calls(), 4);

    let client = LlmClient::OpenAi(OpenAiClient::new(
        cfg.api_key.clone(),
        cfg.api_url.clone(),
        Duration::ZERO,
    ));
    let pipeline = Pipeline::with_client(cfg, client).expect("pipeline");
    let second = pipeline.process_directory().await.expect("second run");
    assert!(second.succeeded());
    assert_eq!(second.ledger.total_calls(), 0);
    assert_eq!(
        second.files["home.json"]["es"].quality_score,
        first.files["home.json"]["es"].quality_score
    );

    // wiremock verifies the .expect(1) call counts on drop.
}

#[tokio::test]
async fn test_worker_failure_degrades_to_fallbacks_not_an_error() {
    let ws = workspace();
    write_input(&ws, "home.json", &json!({"greeting": "Hello"}));

    let server = MockServer::start().await;
    // Every completion call fails outright; the run still finishes with
    // fallback content.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
        .mount(&server)
        .await;

    let mut cfg = config(&ws, &["Spanish"]);
    cfg.mock = false;
    cfg.api_key = "test-key".to_string();
    cfg.api_url = server.uri();

    let client = LlmClient::OpenAi(OpenAiClient::new(
        cfg.api_key.clone(),
        cfg.api_url.clone(),
        Duration::ZERO,
    ));
    let pipeline = Pipeline::with_client(cfg, client).expect("pipeline");
    let outcome = pipeline.process_directory().await.expect("run");

    assert!(outcome.succeeded());
    // Fallbacks keep the source text as the translation.
    let final_text =
        std::fs::read_to_string(ws.output.join("es/home.json")).expect("final file");
    let final_tree: serde_json::Value = serde_json::from_str(&final_text).expect("parse");
    assert_eq!(final_tree, json!({"greeting": "Hello"}));
}
