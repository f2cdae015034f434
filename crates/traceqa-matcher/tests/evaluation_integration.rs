use std::sync::{Arc, Mutex};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use traceqa_config::MatcherConfig;
use traceqa_core::{
    evaluate, normalize, qa_pairs, reconstruct, resolve_expected, CoreError, EvaluateOptions,
    FaqMatcher, QaMap,
};
use traceqa_matcher::HttpMatcher;

#[derive(Default)]
struct MockState {
    queries: Mutex<Vec<String>>,
}

async fn spawn_mock_server() -> (String, Arc<MockState>) {
    async fn handler(
        State(state): State<Arc<MockState>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, String) {
        let query = body
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        state
            .queries
            .lock()
            .expect("query lock")
            .push(query.clone());

        if query.contains("refund") {
            return (StatusCode::SERVICE_UNAVAILABLE, "model loading".to_string());
        }

        let matched = if query.to_ascii_lowercase().contains("open") {
            "What are your opening hours?"
        } else {
            "What is AI?"
        };
        (
            StatusCode::OK,
            json!({"matched": matched, "score": 0.912}).to_string(),
        )
    }

    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/match", post(handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/match", addr), state)
}

fn reference_faqs() -> QaMap {
    QaMap::from([
        (
            "What is AI?".to_string(),
            "AI means Artificial Intelligence".to_string(),
        ),
        (
            "What are your opening hours?".to_string(),
            "We are open 9am to 5pm".to_string(),
        ),
    ])
}

fn span(span_id: &str, start_us: u64, operation: &str) -> Value {
    json!({
        "spanID": span_id,
        "operationName": operation,
        "startTime": start_us,
        "duration": 120,
        "tags": [{"key": "http.status_code", "type": "int64", "value": 200}]
    })
}

fn capture() -> Value {
    json!({
        "data": [
            {
                "traceID": "trace-ai",
                "spans": [
                    span("a3", 3_000_000, "[SlashGPTServer][inference] Response time: 1.25"),
                    span("a1", 1_000_000, "[BPAgent][inference] Query from user u1: ctx -- What is AI?"),
                    span("a2", 2_000_000, "[Assistant][call_llm] Received question: [Context query: What is AI?][Current input: AI means Artificial Intelligence]")
                ]
            },
            {
                "traceID": "trace-hours",
                "spans": [
                    span("b1", 4_000_000, "[BPAgent][inference] Query from user u2: ctx -- When do you open?"),
                    span("b2", 5_000_000, "[Assistant][call_llm] Received question: [Context query: When do you open?][Current input: Around nine]"),
                    span("b3", 6_000_000, "[SlashGPTServer][inference] Response time: 0.80")
                ]
            },
            {
                "traceID": "trace-refund",
                "spans": [
                    span("c1", 7_000_000, "[BPAgent][inference] Query from user u3: ctx -- Can I get a refund?"),
                    span("c2", 8_000_000, "[SlashGPTServer][inference] Response time: 2.00")
                ]
            }
        ]
    })
}

#[tokio::test]
async fn capture_to_accuracy_end_to_end() {
    let (url, state) = spawn_mock_server().await;
    let matcher = FaqMatcher::new(
        HttpMatcher::new(MatcherConfig {
            url,
            timeout_seconds: 5.0,
        })
        .expect("matcher client"),
        reference_faqs(),
    )
    .expect("faq matcher");

    let entries = normalize(&capture()).expect("capture should normalize");
    let transactions = reconstruct(&entries);
    assert_eq!(transactions.len(), 3);
    assert!(transactions.iter().all(|tx| tx.completed));
    assert_eq!(transactions[0].response_time_ms, Some(1250.0));
    assert_eq!(qa_pairs(&transactions).len(), 2);

    let expected = resolve_expected(
        &reference_faqs(),
        Some(
            r#"[
                {"query": "What is AI?", "answer": "AI means Artificial Intelligence"},
                {"query": "When do you open?", "answer": "We are open 9am to 5pm"},
                {"query": "Can I get a refund?", "answer": "Within 30 days"}
            ]"#,
        ),
    )
    .expect("override should validate");

    let report = evaluate(&transactions, &expected, &matcher, &EvaluateOptions::default())
        .await
        .expect("evaluation should complete");

    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|result| result.correct));
    assert_eq!(report.results[1].actual.as_deref(), Some("Around nine"));
    assert_eq!(report.results[1].similarity, 0.912);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].query, "Can I get a refund?");
    assert_eq!(report.accuracy, Some(100.0));

    let queries = state.queries.lock().expect("query lock").clone();
    assert_eq!(
        queries,
        vec![
            "What is AI?".to_string(),
            "When do you open?".to_string(),
            "Can I get a refund?".to_string(),
        ]
    );
}

#[tokio::test]
async fn invalid_override_stops_before_any_match_call() {
    let (_url, state) = spawn_mock_server().await;

    let err = resolve_expected(&reference_faqs(), Some("{}")).expect_err("empty override");
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(state.queries.lock().expect("query lock").is_empty());
}
