// HTTP layer tests — drive the axum Router directly with oneshot requests.

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use topical::llm::client::OpenAiFactory;
use topical::pipeline::{Pipeline, PipelineConfig};
use topical::topics::hashing::HashingLoader;
use topical::topics::registry::EmbedderRegistry;
use topical::web::{build_router, AppState};

fn app() -> axum::Router {
    let pipeline = Pipeline::new(
        Arc::new(EmbedderRegistry::new(Arc::new(HashingLoader))),
        Arc::new(OpenAiFactory::default()),
        PipelineConfig {
            embedding_model: "hashing".to_string(),
            ..PipelineConfig::default()
        },
    );
    build_router(AppState {
        pipeline: Arc::new(pipeline),
    })
}

fn post_analyze(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn empty_comments_rejected_before_stream() {
    let response = app()
        .oneshot(post_analyze(r#"{"comments": []}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_string(response).await;
    assert!(!body.contains("progress"));
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"status": "error", "error": "No comments to analyze"}));
}

#[tokio::test]
async fn malformed_json_rejected() {
    let response = app().oneshot(post_analyze("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn analyze_streams_ndjson_blocks() {
    let response = app()
        .oneshot(post_analyze(
            r#"{"comments": ["great product", "terrible product", "great product again"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );

    let body = body_string(response).await;
    let blocks: Vec<Value> = body
        .split("\n\n")
        .filter(|b| !b.trim().is_empty())
        .map(|b| serde_json::from_str(b).unwrap())
        .collect();

    assert_eq!(blocks[0]["status"], "progress");
    let terminal: Vec<&Value> = blocks
        .iter()
        .filter(|b| b["status"] != "progress")
        .collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0]["status"], "complete");
    assert_eq!(terminal[0]["data"]["num_comments"], 3);
    assert!(terminal[0]["data"].get("summary").is_none());
}

#[tokio::test]
async fn cors_preflight_allowed() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/analyze")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
