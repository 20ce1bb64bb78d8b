use std::future::Future;

use super::{make_close, make_series, TestResult, EMPTY_ROUTINE_ID, FIXTURE_ROUTINE_ID};
use crate::{RoutineStore, SessionStore};

pub(super) async fn run_session_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "session",
            "create_session_starts_open_and_empty",
            create_session_starts_open_and_empty(factory).await,
        ),
        TestResult::from_result(
            "session",
            "session_ids_are_distinct",
            session_ids_are_distinct(factory).await,
        ),
        TestResult::from_result(
            "session",
            "create_session_for_empty_routine",
            create_session_for_empty_routine(factory).await,
        ),
        TestResult::from_result(
            "session",
            "append_preserves_insertion_order",
            append_preserves_insertion_order(factory).await,
        ),
        TestResult::from_result(
            "session",
            "close_sets_finished_at_and_note",
            close_sets_finished_at_and_note(factory).await,
        ),
        TestResult::from_result(
            "session",
            "close_without_series_is_valid",
            close_without_series_is_valid(factory).await,
        ),
        TestResult::from_result(
            "session",
            "sessions_are_independent",
            sessions_are_independent(factory).await,
        ),
    ]
}

// ── 1. A new session is open, empty, and stamped ────────────────────────────

async fn create_session_starts_open_and_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| format!("create: {e}"))?;
    let session = s.get_session(id).await.map_err(|e| format!("get: {e}"))?;
    if session.id != id || session.routine_id != FIXTURE_ROUTINE_ID {
        return Err(format!("wrong ids on new session: {:?}", session));
    }
    if session.started_at.is_empty() {
        return Err("started_at must be stamped".to_string());
    }
    if session.finished_at.is_some() || session.general_note.is_some() {
        return Err(format!("new session must be open: {:?}", session));
    }
    if !session.completed_series.is_empty() {
        return Err("new session must have no series".to_string());
    }
    Ok(())
}

// ── 2. Two creates yield two ids ────────────────────────────────────────────

async fn session_ids_are_distinct<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    if a == b {
        return Err(format!("both sessions got id {a}"));
    }
    Ok(())
}

// ── 3. Existence, not content, decides whether a session can be created ─────

async fn create_session_for_empty_routine<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_session(EMPTY_ROUTINE_ID)
        .await
        .map(|_| ())
        .map_err(|e| format!("expected Ok for an existing empty routine, got {e}"))
}

// ── 4. Series come back in the order they were appended ─────────────────────

async fn append_preserves_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    let appended = vec![
        make_series(10, 1, 8),
        make_series(10, 2, 7),
        make_series(10, 3, 6),
        make_series(11, 1, 12),
    ];
    for record in &appended {
        s.append_series_record(id, record.clone())
            .await
            .map_err(|e| format!("append: {e}"))?;
    }
    let session = s.get_session(id).await.map_err(|e| e.to_string())?;
    if session.completed_series != appended {
        return Err(format!(
            "expected {:?}, got {:?}",
            appended, session.completed_series
        ));
    }
    Ok(())
}

// ── 5. Close stamps finished_at and stores the note ─────────────────────────

async fn close_sets_finished_at_and_note<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    s.append_series_record(id, make_series(10, 1, 8))
        .await
        .map_err(|e| e.to_string())?;
    s.close_session(id, make_close(Some("felt strong")))
        .await
        .map_err(|e| format!("close: {e}"))?;
    let session = s.get_session(id).await.map_err(|e| e.to_string())?;
    if session.finished_at.as_deref() != Some("2025-01-01T01:00:00Z") {
        return Err(format!("finished_at not stored: {:?}", session.finished_at));
    }
    if session.general_note.as_deref() != Some("felt strong") {
        return Err(format!("note not stored: {:?}", session.general_note));
    }
    if session.completed_series.len() != 1 {
        return Err("close must keep existing series".to_string());
    }
    Ok(())
}

// ── 6. Partial (even empty) sessions can be closed ──────────────────────────

async fn close_without_series_is_valid<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let id = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    s.close_session(id, make_close(None))
        .await
        .map_err(|e| format!("close: {e}"))?;
    let session = s.get_session(id).await.map_err(|e| e.to_string())?;
    if !session.is_closed() || session.general_note.is_some() {
        return Err(format!("unexpected closed session: {:?}", session));
    }
    Ok(())
}

// ── 7. Appends to one session never show up in another ──────────────────────

async fn sessions_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    s.append_series_record(a, make_series(10, 1, 8))
        .await
        .map_err(|e| e.to_string())?;
    s.close_session(a, make_close(None))
        .await
        .map_err(|e| e.to_string())?;
    let other = s.get_session(b).await.map_err(|e| e.to_string())?;
    if !other.completed_series.is_empty() || other.is_closed() {
        return Err(format!("session {b} was affected by session {a}: {:?}", other));
    }
    Ok(())
}
