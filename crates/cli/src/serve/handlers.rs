//! Core HTTP route handlers: health, routines.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use gymtrack_storage::RoutineStore;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timer = state.timer.state();
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.sessions.read().await.len(),
        "timer_running": timer.running,
    });
    (StatusCode::OK, Json(response))
}

/// GET /routines
pub(crate) async fn handle_list_routines(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let routines: Vec<serde_json::Value> = state
        .storage
        .list_routines()
        .await
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "name": r.name,
                "exercise_count": r.exercises.len(),
            })
        })
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "routines": routines })))
}

/// GET /routines/{id}/exercises
pub(crate) async fn handle_routine_exercises(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.storage.get_routine_exercises(id).await {
        Ok(exercises) => {
            let response = serde_json::json!({
                "routine_id": id,
                "exercises": exercises,
            });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) if e.is_not_found() => {
            json_error(StatusCode::NOT_FOUND, &e.to_string()).into_response()
        }
        Err(e) => json_error(StatusCode::BAD_GATEWAY, &e.to_string()).into_response(),
    }
}
