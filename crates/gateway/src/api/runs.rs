//! HTTP handlers for the run lifecycle (§6 of SPEC_FULL): start a run,
//! read back its journal and sources, and tail it live over SSE.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub chat_id: Option<Uuid>,
    pub user_id: Uuid,
    pub query: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub chat_id: Uuid,
    pub run_id: Uuid,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub async fn start_run(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> Response {
    if req.query.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "query must not be empty");
    }

    match state
        .orchestrator
        .start(req.user_id, req.chat_id, req.query, req.model)
        .await
    {
        Ok(outcome) => Json(StartRunResponse {
            chat_id: outcome.chat_id,
            run_id: outcome.run_id,
        })
        .into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn list_steps(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.replay_steps(id).await {
        Ok(steps) => Json(steps).into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn list_sources(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.list_sources(id).await {
        Ok(sources) => Json(sources).into_response(),
        Err(err) => api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// SSE stream for one run, per SPEC_FULL §4.7: replay the Journal as
/// `step` frames, then tail the Hub verbatim with a 15-second keep-alive.
/// The Hub already hands back fully-formatted SSE wire bytes, so this
/// streams them straight through rather than re-wrapping them in axum's
/// typed `Event`/`Sse` machinery.
pub async fn stream_run(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let replayed = match state.store.replay_steps(id).await {
        Ok(steps) => steps,
        Err(err) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };

    let hub = state.hub.clone();
    let mut sub = hub.subscribe(id);

    let stream = async_stream::stream! {
        for step in &replayed {
            yield Ok::<Bytes, std::convert::Infallible>(crate::emitter::frame(step));
        }

        let mut keep_alive = tokio::time::interval(std::time::Duration::from_secs(15));
        keep_alive.tick().await; // first tick fires immediately; discard it

        loop {
            tokio::select! {
                frame = sub.receiver.recv() => {
                    match frame {
                        Some(bytes) => yield Ok(bytes),
                        None => break,
                    }
                }
                _ = keep_alive.tick() => {
                    yield Ok(Bytes::from_static(b": keep-alive\n\n"));
                }
            }
        }
        hub.unsubscribe(&sub);
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap()
}
