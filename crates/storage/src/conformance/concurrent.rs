use std::future::Future;
use std::sync::Arc;

use super::{make_close, make_series, TestResult, FIXTURE_ROUTINE_ID};
use crate::{RoutineStore, SessionStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_appends_all_kept",
        concurrent_appends_all_kept(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_closes_exactly_one_wins",
        concurrent_closes_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_creates_all_distinct",
        concurrent_creates_all_distinct(factory).await,
    ));

    results
}

// ── Concurrent appends: none lost ───────────────────────────────────────────

/// N tasks append one series each to the same session. All N must be stored.
async fn concurrent_appends_all_kept<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let id = storage
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.append_series_record(id, make_series(10, i as u32 + 1, 5))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }

    let session = storage.get_session(id).await.map_err(|e| e.to_string())?;
    if session.completed_series.len() != N {
        return Err(format!(
            "expected {} series, got {}",
            N,
            session.completed_series.len()
        ));
    }
    let mut indices: Vec<u32> = session
        .completed_series
        .iter()
        .map(|r| r.series_index)
        .collect();
    indices.sort_unstable();
    let expected: Vec<u32> = (1..=N as u32).collect();
    if indices != expected {
        return Err(format!("expected indices {:?}, got {:?}", expected, indices));
    }
    Ok(())
}

// ── Concurrent close: exactly one wins ──────────────────────────────────────

/// N tasks race to close the same session. Exactly one succeeds; the rest
/// must get SessionClosed.
async fn concurrent_closes_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let id = storage
        .create_session(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.close_session(id, make_close(None)).await {
                Ok(()) => Ok(true),
                Err(StorageError::SessionClosed { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners));
    }
    Ok(())
}

// ── Concurrent creates: unique ids ──────────────────────────────────────────

async fn concurrent_creates_all_distinct<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(
            async move { s.create_session(FIXTURE_ROUTINE_ID).await },
        ));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(
            handle
                .await
                .map_err(|e| format!("task panic: {e}"))?
                .map_err(|e| format!("create: {e}"))?,
        );
    }
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != N {
        return Err(format!("expected {} distinct ids, got {:?}", N, ids));
    }
    Ok(())
}
