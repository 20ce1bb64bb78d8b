//! Workout session routes.
//!
//! Every mutating route answers with the session view after the change, so a
//! page can re-render from the response alone.
//!
//! Only sessions still in progress stay in memory. Once a session completes
//! it is dropped from the live map and later reads come from the store.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gymtrack_core::{SeriesInput, SessionController, SessionError};
use gymtrack_storage::{SessionRecord, SessionStore};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::json_error;
use super::state::{AppState, SharedSession};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionRequest {
    pub(crate) routine_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtendRestRequest {
    pub(crate) delta_seconds: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NoteRequest {
    #[serde(default)]
    pub(crate) note: Option<String>,
}

fn session_error(err: SessionError) -> Response {
    let status = match &err {
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::OperationFailed(_) => StatusCode::BAD_GATEWAY,
        SessionError::InvalidState { .. } => StatusCode::CONFLICT,
    };
    json_error(status, &err.to_string()).into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, &rejection.body_text()).into_response()
}

fn not_found(id: i64) -> Response {
    json_error(StatusCode::NOT_FOUND, &format!("session {} not found", id)).into_response()
}

/// A closed session as read back from the store.
async fn closed_session(state: &AppState, id: i64) -> Option<SessionRecord> {
    match state.storage.get_session(id).await {
        Ok(record) if record.is_closed() => Some(record),
        Ok(_) => None,
        Err(e) => {
            if !e.is_not_found() {
                tracing::warn!(session_id = id, error = %e, "session read-back failed");
            }
            None
        }
    }
}

fn closed_view(record: SessionRecord) -> Response {
    let body = serde_json::json!({
        "session_id": record.id,
        "routine_id": record.routine_id,
        "started_at": record.started_at,
        "finished_at": record.finished_at,
        "general_note": record.general_note,
        "state": "session_complete",
        "completed_series": record.completed_series,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// Live session for a mutating route. A session that already closed
/// answers 409, an unknown one 404.
async fn find(state: &AppState, id: i64) -> Result<SharedSession, Response> {
    if let Some(session) = state.session(id).await {
        return Ok(session);
    }
    match closed_session(state, id).await {
        Some(_) => Err(json_error(
            StatusCode::CONFLICT,
            &format!("session {} is already complete", id),
        )
        .into_response()),
        None => Err(not_found(id)),
    }
}

/// Answer with the session view, dropping the session from the live map
/// once it has completed.
async fn respond(state: &AppState, session: &SessionController) -> Response {
    if session.state().is_complete() {
        state.sessions.write().await.remove(&session.id());
        tracing::debug!(session_id = session.id(), "session retired");
    }
    (StatusCode::OK, Json(session.view())).into_response()
}

/// POST /sessions
pub(crate) async fn handle_create_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };

    let begun = SessionController::begin(
        &*state.storage,
        state.storage.clone(),
        state.timer.clone(),
        state.session_config.clone(),
        request.routine_id,
    )
    .await;

    match begun {
        Ok(session) => {
            let body = session.view();
            state
                .sessions
                .write()
                .await
                .insert(session.id(), Arc::new(Mutex::new(session)));
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => session_error(e),
    }
}

/// GET /sessions/{id}
pub(crate) async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    if let Some(session) = state.session(id).await {
        return respond(&state, &*session.lock().await).await;
    }
    match closed_session(&state, id).await {
        Some(record) => closed_view(record),
        None => not_found(id),
    }
}

/// POST /sessions/{id}/series
pub(crate) async fn handle_record_series(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<SeriesInput>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let session = match find(&state, id).await {
        Ok(s) => s,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.record_series(input).await {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}

/// POST /sessions/{id}/advance
pub(crate) async fn handle_advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let session = match find(&state, id).await {
        Ok(s) => s,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.advance().await {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}

/// POST /sessions/{id}/rest/extend
pub(crate) async fn handle_extend_rest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<ExtendRestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let session = match find(&state, id).await {
        Ok(s) => s,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.extend_rest(request.delta_seconds) {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}

/// POST /sessions/{id}/rest/skip
pub(crate) async fn handle_skip_rest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let session = match find(&state, id).await {
        Ok(s) => s,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.skip_rest() {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}

/// POST /sessions/{id}/note
pub(crate) async fn handle_set_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_body(rejection),
    };
    let session = match find(&state, id).await {
        Ok(s) => s,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.set_general_note(request.note) {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}

/// POST /sessions/{id}/finalize
///
/// The body is optional: an empty body finalizes with the stored note.
pub(crate) async fn handle_finalize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        NoteRequest::default()
    } else {
        match serde_json::from_slice::<NoteRequest>(&body) {
            Ok(r) => r,
            Err(e) => {
                return json_error(StatusCode::BAD_REQUEST, &format!("invalid JSON: {}", e))
                    .into_response()
            }
        }
    };
    let Some(session) = state.session(id).await else {
        // Finalizing a closed session changes nothing.
        return match closed_session(&state, id).await {
            Some(record) => closed_view(record),
            None => not_found(id),
        };
    };

    let mut session = session.lock().await;
    match session.finalize(request.note).await {
        Ok(()) => respond(&state, &session).await,
        Err(e) => session_error(e),
    }
}
