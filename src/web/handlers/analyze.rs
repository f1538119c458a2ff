// POST /analyze — run the topic pipeline and stream its events.
//
// Returns 400 with a JSON error when the body is malformed or has no
// comments; no stream is opened in that case. Otherwise returns 200 with an
// `application/x-ndjson` body: progress events, then exactly one
// `complete` or `error` event.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use crate::pipeline::AnalyzeRequest;
use crate::web::{api_error, AppState};

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected analyze request body");
            return api_error(StatusCode::BAD_REQUEST, "No JSON data received");
        }
    };

    if let Err(e) = request.validate() {
        return api_error(StatusCode::BAD_REQUEST, &e.to_string());
    }

    info!(comments = request.comments.len(), "Analyze request accepted");
    let rx = state.pipeline.start(request);

    let frames = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event.to_frame()), rx))
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}
