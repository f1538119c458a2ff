// Web server — Axum-based streaming analysis API.
//
// GET /health reports liveness. POST /analyze validates the body up front
// (so bad input gets a plain 400) and then streams the run's progress and
// result as newline-delimited JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::topics::registry::EmbedderRegistry;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Wire the embedder registry and completion factory from config.
    pub fn from_config(config: &Config) -> Self {
        let registry = Arc::new(EmbedderRegistry::new(config.embedder_loader()));
        let pipeline = Pipeline::new(
            registry,
            Arc::new(config.chat_factory()),
            config.pipeline_config(),
        );
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(config: Config, port: u16, bind: &str) -> Result<()> {
    let state = AppState::from_config(&config);
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!(
        embedder = %config.embedding_model,
        cluster_mode = ?config.cluster_mode,
        "Topic API listening on http://{addr}"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/analyze", post(handlers::analyze::analyze))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        axum::Json(serde_json::json!({ "status": "error", "error": message })),
    )
        .into_response()
}
