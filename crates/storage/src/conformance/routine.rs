use std::future::Future;

use super::{TestResult, EMPTY_ROUTINE_ID, FIXTURE_ROUTINE_ID, MISSING_ROUTINE_ID};
use crate::{RoutineStore, SessionStore, StorageError};

pub(super) async fn run_routine_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "routine",
            "exercises_returned_in_routine_order",
            exercises_returned_in_routine_order(factory).await,
        ),
        TestResult::from_result(
            "routine",
            "exercise_targets_round_trip",
            exercise_targets_round_trip(factory).await,
        ),
        TestResult::from_result(
            "routine",
            "empty_routine_yields_empty_list",
            empty_routine_yields_empty_list(factory).await,
        ),
        TestResult::from_result(
            "routine",
            "missing_routine_is_not_found",
            missing_routine_is_not_found(factory).await,
        ),
    ]
}

async fn exercises_returned_in_routine_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let exercises = s
        .get_routine_exercises(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<i64> = exercises.iter().map(|e| e.exercise_id).collect();
    if ids != vec![10, 11] {
        return Err(format!("expected exercise ids [10, 11], got {:?}", ids));
    }
    Ok(())
}

async fn exercise_targets_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let exercises = s
        .get_routine_exercises(FIXTURE_ROUTINE_ID)
        .await
        .map_err(|e| e.to_string())?;
    let bench = exercises.first().ok_or("fixture routine has no exercises")?;
    if bench.target_series != 3 || bench.target_reps != Some(8) {
        return Err(format!("bench targets changed: {:?}", bench));
    }
    if bench.suggested_weight != Some(60.0) || bench.rest_seconds != Some(90) {
        return Err(format!("bench weight/rest changed: {:?}", bench));
    }
    let dips = exercises.get(1).ok_or("fixture routine lost its second exercise")?;
    if dips.rest_seconds.is_some() || dips.suggested_weight.is_some() {
        return Err(format!("unset fields must stay unset: {:?}", dips));
    }
    Ok(())
}

async fn empty_routine_yields_empty_list<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_routine_exercises(EMPTY_ROUTINE_ID).await {
        Ok(list) if list.is_empty() => Ok(()),
        other => Err(format!("expected Ok([]), got {:?}", other)),
    }
}

async fn missing_routine_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_routine_exercises(MISSING_ROUTINE_ID).await {
        Err(StorageError::RoutineNotFound { routine_id }) if routine_id == MISSING_ROUTINE_ID => {
            Ok(())
        }
        other => Err(format!("expected RoutineNotFound, got {:?}", other)),
    }
}
