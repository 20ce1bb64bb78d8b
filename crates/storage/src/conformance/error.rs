use std::future::Future;

use super::{make_close, make_series, TestResult, FIXTURE_ROUTINE_ID, MISSING_ROUTINE_ID};
use crate::{RoutineStore, SessionStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "create_session_for_missing_routine",
        create_session_for_missing_routine(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_session_nonexistent",
        get_session_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "append_to_nonexistent_session",
        append_to_nonexistent_session(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "close_nonexistent_session",
        close_nonexistent_session(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "append_after_close_rejected",
        append_after_close_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "double_close_rejected_and_first_close_kept",
        double_close_rejected_and_first_close_kept(factory).await,
    ));

    results
}

// ── 1. create_session on a missing routine returns RoutineNotFound ───────────

async fn create_session_for_missing_routine<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.create_session(MISSING_ROUTINE_ID).await {
        Err(StorageError::RoutineNotFound { routine_id }) => {
            if routine_id != MISSING_ROUTINE_ID {
                return Err(format!(
                    "expected routine_id {}, got {}",
                    MISSING_ROUTINE_ID, routine_id
                ));
            }
            Ok(())
        }
        other => Err(format!("expected RoutineNotFound, got {:?}", other)),
    }
}

// ── 2. get_session on empty store returns SessionNotFound ────────────────────

async fn get_session_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_session(4242).await {
        Err(StorageError::SessionNotFound { session_id: 4242 }) => Ok(()),
        other => Err(format!("expected SessionNotFound(4242), got {:?}", other)),
    }
}

// ── 3. append to a missing session returns SessionNotFound ───────────────────

async fn append_to_nonexistent_session<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.append_series_record(77, make_series(10, 1, 8)).await {
        Err(StorageError::SessionNotFound { session_id: 77 }) => Ok(()),
        other => Err(format!("expected SessionNotFound(77), got {:?}", other)),
    }
}

// ── 4. close a missing session returns SessionNotFound ───────────────────────

async fn close_nonexistent_session<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.close_session(78, make_close(None)).await {
        Err(StorageError::SessionNotFound { session_id: 78 }) => Ok(()),
        other => Err(format!("expected SessionNotFound(78), got {:?}", other)),
    }
}

// ── 5. a closed session accepts no more series ───────────────────────────────

async fn append_after_close_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| e.to_string())?;
    match s.append_series_record(id, make_series(10, 1, 8)).await {
        Err(StorageError::SessionClosed { session_id }) if session_id == id => {}
        other => return Err(format!("expected SessionClosed, got {:?}", other)),
    }
    let session = s.get_session(id).await.map_err(|e| e.to_string())?;
    if !session.completed_series.is_empty() {
        return Err("rejected append must not be stored".to_string());
    }
    Ok(())
}

// ── 6. closing twice fails and leaves the first close intact ─────────────────

async fn double_close_rejected_and_first_close_kept<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.close_session(id, make_close(Some("first")))
        .await
        .map_err(|e| e.to_string())?;
    match s.close_session(id, make_close(Some("second"))).await {
        Err(StorageError::SessionClosed { .. }) => {}
        other => return Err(format!("expected SessionClosed, got {:?}", other)),
    }
    let session = s.get_session(id).await.map_err(|e| e.to_string())?;
    if session.general_note.as_deref() != Some("first") {
        return Err(format!(
            "second close overwrote the note: {:?}",
            session.general_note
        ));
    }
    Ok(())
}
