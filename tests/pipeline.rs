// tests/pipeline.rs
// End-to-end runs over files with a scripted inference transport

use async_trait::async_trait;
use reqconflict::config::AnalysisConfig;
use reqconflict::conflict::{
    Analyzer, DedupSet, NO_CONFLICT, PseudoTrainer, UNKNOWN, normalize_pair_rows,
};
use reqconflict::llm::{
    CachedInference, InferenceClient, ResponseCache, RetryPolicy, Transport, TransportError,
    TransportResponse,
};
use reqconflict::table::{self, InputTable};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Flags anything mentioning "petrol" as a power source conflict and
/// rate-limits anything mentioning "throttled"
struct ScriptedModel {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn envelope(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

#[async_trait]
impl Transport for ScriptedModel {
    async fn send(&self, _request_id: &str, body: String) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(body.clone());
        if body.contains("throttled") {
            return Ok(TransportResponse {
                status: 429,
                body: r#"{"error":{"code":429,"message":"quota"}}"#.to_string(),
            });
        }
        let text = if body.contains("petrol") {
            "Conflict_Type: Power Source Conflict||Reason: electric versus petrol"
        } else {
            "Conflict_Type: No Conflict||Reason: compatible"
        };
        Ok(TransportResponse {
            status: 200,
            body: envelope(text),
        })
    }
}

fn analyzer(model: Arc<ScriptedModel>) -> Analyzer {
    let client = InferenceClient::new(
        model,
        RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
        },
    );
    let config = AnalysisConfig {
        workers: 4,
        max_in_flight: 2,
        request_delay: Duration::ZERO,
        cache_capacity: 64,
    };
    Analyzer::new(
        Arc::new(CachedInference::with_capacity(client, 64)),
        config,
        CancellationToken::new(),
    )
}

fn write_input(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn test_predict_then_check_against_results() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        "requirements.csv",
        "Requirements\n\
         The vehicle should be fully electric.\n\
         The bike must have a top speed of 120 km/h.\n\
         The frame must be aluminium.\n\
         The vehicle should be fully electric.\n",
    );

    let model = ScriptedModel::new();
    let analyzer = analyzer(model.clone());

    let loaded = table::load_table(&input).unwrap();
    let InputTable::Flat(requirements) = &loaded else {
        panic!("expected a flat table");
    };
    let outcome = analyzer.run_exhaustive(requirements, &DedupSet::new(), None).await;
    assert!(!outcome.is_interrupted());
    assert_eq!(outcome.records().len(), 3);
    assert_eq!(model.calls(), 3);

    let keys: HashSet<String> = outcome.records().iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), 3);

    let paths = table::write_results(outcome.records(), &dir.path().join("results")).unwrap();
    assert!(paths.csv.exists() && paths.xlsx.exists());

    // Either output format works as the table to check against
    let from_xlsx = table::load_table(&paths.xlsx).unwrap().requirements();

    // The results table feeds incremental checks
    let existing = table::load_table(&paths.csv).unwrap().requirements();
    assert_eq!(existing.len(), 3);
    assert_eq!(from_xlsx, existing);

    let conflicts = analyzer
        .run_incremental("The bike runs on petrol.", &existing, &DedupSet::new(), None)
        .await
        .into_records();
    assert_eq!(conflicts.len(), 3);
    assert!(conflicts.iter().all(|r| r.conflict_type == "Power Source Conflict"));
    assert_eq!(model.calls(), 6);
}

#[tokio::test]
async fn test_rate_limited_pairs_need_manual_review() {
    let model = ScriptedModel::new();
    let analyzer = analyzer(model.clone());
    let requirements = vec![
        "throttled requirement".to_string(),
        "plain requirement".to_string(),
    ];

    let records = analyzer
        .run_exhaustive(&requirements, &DedupSet::new(), None)
        .await
        .into_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conflict_type, UNKNOWN);
    assert_eq!(records[0].conflict_reason, "Requires manual review");
    // max_retries attempts, nothing cached
    assert_eq!(model.calls(), 2);
    assert!(analyzer.inference().cache().is_empty());
}

#[tokio::test]
async fn test_paired_table_training_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        "labeled.csv",
        "Requirement_1,Requirement_2,Conflict_Type,Conflict_Reason\n\
         The bike runs on petrol.,The vehicle should be fully electric.,Power Source Conflict,fuel\n\
         The vehicle should be fully electric.,The bike runs on petrol.,Power Source Conflict,duplicate\n\
         The frame must be aluminium.,Seats are leather.,No Conflict,\n",
    );

    let InputTable::Paired(rows) = table::load_table(&input).unwrap() else {
        panic!("expected a paired table");
    };
    let labeled = normalize_pair_rows(&rows);
    assert_eq!(labeled.len(), 2);

    let model = ScriptedModel::new();
    let trained = analyzer(model.clone());
    let outcome = PseudoTrainer::new(&trained).train(&labeled, 2).await.unwrap();

    assert_eq!(outcome.accuracies(), vec![1.0, 1.0]);
    assert_eq!(outcome.weights.get("Power Source Conflict"), 2.0);
    assert_eq!(outcome.weights.get(NO_CONFLICT), 2.0);

    let paths = table::write_results(&outcome.predictions, &dir.path().join("training")).unwrap();
    let csv_text = std::fs::read_to_string(&paths.csv).unwrap();
    assert!(csv_text.lines().next().unwrap().ends_with("Expected_Conflict,Expected_Reason"));
    assert_eq!(csv_text.lines().count(), 3);

    // Saved weights steer a later exhaustive run
    let weights_file = table::weights_path(&dir.path().join("training"));
    table::write_weights(&outcome.weights, &weights_file).unwrap();
    let weights = table::load_weights(&weights_file).unwrap();
    assert_eq!(weights, outcome.weights);

    let fresh = ScriptedModel::new();
    let later = analyzer(fresh.clone());
    let requirements = vec!["The bike runs on petrol.".to_string(), "Seats are leather.".to_string()];
    let records = later
        .run_exhaustive(&requirements, &DedupSet::new(), Some(&weights))
        .await
        .into_records();
    assert_eq!(records.len(), 1);
    let prompts = fresh.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Power Source Conflict (weight: 2.00)"));
}

#[tokio::test]
async fn test_interrupted_run_persists_partial_file() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedModel::new();
    let analyzer = analyzer(model.clone());
    analyzer.cancel_token().cancel();

    let requirements: Vec<String> = (0..5).map(|i| format!("requirement {}", i)).collect();
    let outcome = analyzer.run_exhaustive(&requirements, &DedupSet::new(), None).await;
    assert!(outcome.is_interrupted());
    assert_eq!(model.calls(), 0);

    let paths = table::write_partial_results(outcome.records(), &dir.path().join("results")).unwrap();
    let name = paths.csv.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("results_partial_"));
}
