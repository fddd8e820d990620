//! Route handlers: the chat page, health check and the session API.
//!
//! Session ids arrive as path strings and are parsed here; a malformed id is a 400
//! with a JSON error body.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use docchat_core::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::sessions::SessionHandle;
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: Uuid,
    pub transcript: Vec<ChatTurn>,
}

/// Reply to a submitted question: the value to put back in the input box
/// (always empty), the updated transcript and the sources behind the answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    pub input: String,
    pub transcript: Vec<ChatTurn>,
    pub sources: Vec<String>,
}

pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "chunks": state.chat.store().len(),
        "sessions": state.sessions.len().await,
    }))
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<Value> {
    let id = state.sessions.create().await;
    Json(json!({ "session_id": id }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let session_id = parse_id(&raw_id)?;
    let session = find(&state, &session_id).await?;
    let transcript = session.lock().await;
    Ok(Json(TranscriptResponse {
        session_id,
        transcript: transcript.turns().to_vec(),
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session_id = parse_id(&raw_id)?;
    if !state.sessions.remove(&session_id).await {
        return Err(not_found(&session_id));
    }
    Ok(Json(json!({ "deleted": session_id })))
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let session_id = parse_id(&raw_id)?;
    let Json(req) = body?;
    let session = find(&state, &session_id).await?;
    let mut transcript = session.lock().await;
    let answer = state.chat.submit(&mut transcript, &req.question).await?;
    Ok(Json(TurnResponse {
        input: String::new(),
        transcript: transcript.turns().to_vec(),
        sources: answer
            .sources
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    }))
}

/// Clears the session's transcript; the next turn starts without history.
pub async fn clear_transcript(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let session_id = parse_id(&raw_id)?;
    let session = find(&state, &session_id).await?;
    let mut transcript = session.lock().await;
    transcript.clear();
    Ok(Json(TranscriptResponse {
        session_id,
        transcript: Vec::new(),
    }))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid session id {raw:?}")))
}

async fn find(state: &AppState, session_id: &Uuid) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| not_found(session_id))
}

fn not_found(session_id: &Uuid) -> ApiError {
    ApiError::NotFound(format!("no session {session_id}"))
}
