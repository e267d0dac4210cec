use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use policy_ai::answer::{AnswerEngine, NO_ANSWER};
use policy_ai::embeddings::Embedder;
use policy_ai::llm::Llm;
use policy_ai::store::VectorStore;
use policy_core::domain::{Chunk, DocumentMetadata};
use policy_core::error::AppError;
use policyassistant_lib::http::{build_router, AppState, GENERIC_FAILURE_MESSAGE};

/// Counts of `a` and `b` characters, plus a constant component.
struct CountABEmbedder;

impl Embedder for CountABEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let a = input.chars().filter(|c| *c == 'a').count();
        let b = input.chars().filter(|c| *c == 'b').count();
        Ok(vec![a as f32, b as f32, 0.5])
    }
}

struct FixedLlm {
    reply: Result<String, AppError>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FixedLlm {
    fn ok(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn failing(err: AppError) -> Self {
        Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok("late")
        }
    }
}

impl Llm for FixedLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.reply.clone()
    }
}

fn app_with(texts: &[&str], llm: Arc<FixedLlm>, timeout: Duration) -> (TempDir, Router) {
    let tmp = tempdir().unwrap();
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk {
            ordinal: i as u32,
            text: t.to_string(),
            metadata: DocumentMetadata {
                source: "data/policies/remote_work_policy.txt".to_string(),
                policy_type: "Remote Work Policy".to_string(),
            },
        })
        .collect();
    let store = VectorStore::build(
        tmp.path(),
        Arc::new(CountABEmbedder),
        "mock-embed",
        &chunks,
        "2026-10-19T00:00:00Z",
    )
    .unwrap();
    let engine = AnswerEngine::new(Arc::new(store), llm, "mock-llm", 15);
    (tmp, build_router(AppState::new(Arc::new(engine), timeout)))
}

fn default_app(llm: Arc<FixedLlm>) -> (TempDir, Router) {
    app_with(
        &["Employees may work remotely up to 3 days per week.", "bbb"],
        llm,
        Duration::from_secs(5),
    )
}

fn ask(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ask_returns_the_model_answer() {
    let llm = Arc::new(FixedLlm::ok("Employees may work remotely up to 3 days per week."));
    let (_tmp, app) = default_app(llm.clone());

    let resp = app
        .oneshot(ask(r#"{"question": "How many remote days are allowed?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({"answer": "Employees may work remotely up to 3 days per week."})
    );
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_index_answers_with_fallback() {
    let llm = Arc::new(FixedLlm::ok("unused"));
    let (_tmp, app) = app_with(&[], llm.clone(), Duration::from_secs(5));

    let resp = app.oneshot(ask(r#"{"question": "Anything?"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "answer": NO_ANSWER }));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_requests_are_rejected_with_400() {
    for body in [
        r#"{}"#,
        r#"{"question": 42}"#,
        r#"{"question": null}"#,
        r#"{"question": "#,
        r#"["question"]"#,
    ] {
        let llm = Arc::new(FixedLlm::ok("unused"));
        let (_tmp, app) = default_app(llm.clone());
        let resp = app.oneshot(ask(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body={body}");

        let v = json_body(resp).await;
        let code = v["error"]["code"].as_str().unwrap();
        assert!(code.starts_with("VALIDATION_"), "body={body}; code={code}");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn blank_question_is_answered_not_rejected() {
    let llm = Arc::new(FixedLlm::ok("model output"));
    let (_tmp, app) = default_app(llm.clone());
    let resp = app.oneshot(ask(r#"{"question": ""}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"answer": "model output"}));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

    let llm = Arc::new(FixedLlm::ok("unused"));
    let (_tmp, app) = app_with(&[], llm.clone(), Duration::from_secs(5));
    let resp = app.oneshot(ask(r#"{"question": "   "}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "answer": NO_ANSWER }));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_completion_is_returned_verbatim() {
    let (_tmp, app) = default_app(Arc::new(FixedLlm::ok("")));
    let resp = app.oneshot(ask(r#"{"question": "aaa?"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"answer": ""}));
}

#[tokio::test]
async fn missing_content_type_is_a_validation_error() {
    let (_tmp, app) = default_app(Arc::new(FixedLlm::ok("unused")));
    let req = Request::builder()
        .method("POST")
        .uri("/ask")
        .body(Body::from(r#"{"question": "q"}"#))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"]["code"], "VALIDATION_CONTENT_TYPE");
}

#[tokio::test]
async fn inference_failures_return_a_generic_500() {
    let llm = Arc::new(FixedLlm::failing(
        AppError::new("INFERENCE_FAILED", "Ollama generate request failed")
            .with_details("status=500; body=model not found"),
    ));
    let (_tmp, app) = default_app(llm);

    let resp = app
        .oneshot(ask(r#"{"question": "How many remote days are allowed?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let v = json_body(resp).await;
    assert_eq!(v["error"]["code"], "INFERENCE_FAILED");
    assert_eq!(v["error"]["message"], GENERIC_FAILURE_MESSAGE);
    assert!(!v.to_string().contains("model not found"));
}

#[tokio::test]
async fn slow_answers_time_out_with_504() {
    let llm = Arc::new(FixedLlm::slow(Duration::from_millis(500)));
    let (_tmp, app) = app_with(&["aaa"], llm, Duration::from_millis(50));

    let resp = app.oneshot(ask(r#"{"question": "aaa?"}"#)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(resp).await["error"]["code"], "INFERENCE_TIMEOUT");
}

#[tokio::test]
async fn index_page_is_served() {
    let (_tmp, app) = default_app(Arc::new(FixedLlm::ok("unused")));
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("fetch(\"/ask\""));
}

#[tokio::test]
async fn health_reports_index_size_and_model() {
    let (_tmp, app) = default_app(Arc::new(FixedLlm::ok("unused")));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({"status": "ok", "chunks": 2, "model": "mock-llm"})
    );
}
