use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ndarray::array;
use serde_json::{json, Value};
use tower::ServiceExt;

use sommelier_backend::core::config::AppSettings;
use sommelier_backend::core::errors::ApiError;
use sommelier_backend::llm::{ChatRequest, LlmProvider};
use sommelier_backend::retrieval::{
    Document, Embedder, EmbeddingError, VectorIndex, NO_RESULTS_MESSAGE, RETRIEVAL_APOLOGY,
};
use sommelier_backend::server::router::router;
use sommelier_backend::state::AppState;

/// Maps "red" onto the x axis and everything else onto y.
struct ColourEmbedder;

#[async_trait]
impl Embedder for ColourEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let text = text.to_lowercase();
        if text.contains("offline") {
            return Err(EmbeddingError::Request("connection refused".to_string()));
        }
        Ok(if text.contains("red") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
    }

    fn dimension(&self) -> usize {
        2
    }
}

struct CannedProvider(&'static str);

#[async_trait]
impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        self.0
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        Ok(format!("{} answered {} messages", self.0, request.messages.len()))
    }
}

struct SlowProvider;

#[async_trait]
impl LlmProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<String, ApiError> {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

struct KeylessProvider;

#[async_trait]
impl LlmProvider for KeylessProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<String, ApiError> {
        Err(ApiError::ServiceUnavailable(
            "openai API key is not configured".to_string(),
        ))
    }
}

fn wines() -> VectorIndex {
    VectorIndex::build(
        array![[0.9f32, 0.1], [0.1, 0.9], [0.8, 0.3]],
        vec![
            Document::new(0, "Blackberry and cassis.")
                .with_title("Ridge 2019 Cabernet Sauvignon")
                .with_category("US")
                .with_score("91")
                .with_price("45"),
            Document::new(1, "Green apple and flint.")
                .with_title("Laroche 2021 Chablis")
                .with_category("France")
                .with_score("88")
                .with_price("24"),
            Document::new(2, "Cherry and forest floor.")
                .with_title("Cristom 2020 Pinot Noir")
                .with_category("US")
                .with_score("90")
                .with_price("38"),
        ],
    )
    .unwrap()
}

fn app_with(
    index: VectorIndex,
    settings: AppSettings,
    openai: Arc<dyn LlmProvider>,
    llama: Arc<dyn LlmProvider>,
) -> Router {
    let state = AppState::assemble(settings, Arc::new(ColourEmbedder), index, openai, llama);
    router(state)
}

fn app(index: VectorIndex) -> Router {
    app_with(
        index,
        AppSettings::default(),
        Arc::new(CannedProvider("openai")),
        Arc::new(CannedProvider("llama")),
    )
}

async fn post_chat(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn rag_lists_the_nearest_wine() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({
            "model": "rag",
            "top_k": 1,
            "messages": [{ "role": "user", "content": "recommend a red wine" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["text"],
        "Here are some wines you might enjoy:\n\n\
         - Ridge 2019 Cabernet Sauvignon (US): Blackberry and cassis. | Points: 91, Price: $45"
    );
}

#[tokio::test]
async fn rag_defaults_to_three_results() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({
            "model": "rag",
            "messages": [{ "role": "user", "content": "a red for steak" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = body["text"].as_str().unwrap();
    assert_eq!(text.matches("\n- ").count(), 3);
    assert!(text.find("Ridge").unwrap() < text.find("Cristom").unwrap());
    assert!(text.find("Cristom").unwrap() < text.find("Laroche").unwrap());
}

#[tokio::test]
async fn rag_on_empty_corpus_returns_placeholder() {
    let app = app(VectorIndex::empty(2));
    let (status, body) = post_chat(
        app,
        json!({
            "model": "rag",
            "messages": [{ "role": "user", "content": "recommend a red wine" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], NO_RESULTS_MESSAGE);
}

#[tokio::test]
async fn embedder_outage_returns_only_the_apology() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({
            "model": "rag",
            "messages": [{ "role": "user", "content": "embedder is offline" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": RETRIEVAL_APOLOGY }));
}

#[tokio::test]
async fn missing_model_routes_to_llama() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({
            "messages": [
                { "role": "user", "content": "hello" },
                { "role": "assistant", "content": "hi" },
                { "role": "user", "content": "what goes with salmon?" }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "llama answered 4 messages");
}

#[tokio::test]
async fn unsupported_model_is_a_bad_request() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({ "model": "claude", "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Unsupported model: claude" }));
}

#[tokio::test]
async fn non_positive_top_k_is_a_bad_request() {
    let app = app(wines());
    let (status, body) = post_chat(
        app,
        json!({
            "model": "rag",
            "top_k": 0,
            "messages": [{ "role": "user", "content": "red" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("top_k"));
}

#[tokio::test]
async fn malformed_body_gets_an_error_object() {
    let app = app(wines());
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from("{\"messages\": 42}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn provider_without_key_is_unavailable() {
    let app = app_with(
        wines(),
        AppSettings::default(),
        Arc::new(KeylessProvider),
        Arc::new(CannedProvider("llama")),
    );
    let (status, body) = post_chat(
        app,
        json!({ "model": "openai", "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "openai API key is not configured");
}

#[tokio::test]
async fn slow_provider_times_out() {
    let mut settings = AppSettings::default();
    settings.server.request_timeout_secs = 1;
    let app = app_with(
        wines(),
        settings,
        Arc::new(CannedProvider("openai")),
        Arc::new(SlowProvider),
    );
    let (status, body) = post_chat(
        app,
        json!({ "messages": [{ "role": "user", "content": "hi" }] }),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({ "error": "Request timed out" }));
}

#[tokio::test]
async fn health_reports_corpus_shape() {
    let app = app(wines());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok", "documents": 3, "dimension": 2 }));
}
