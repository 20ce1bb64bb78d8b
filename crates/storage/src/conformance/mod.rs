//! Conformance test suite for routine and session store implementations.
//!
//! This module provides a backend-agnostic test suite that any store
//! implementing both [`RoutineStore`] and [`SessionStore`] can run to verify
//! correctness. The suite covers:
//!
//! - **Routines**: ordered exercise lookup, empty routines, missing routines
//! - **Sessions**: creation, append order, close, read-back
//! - **Errors**: correct variants for missing and closed sessions
//! - **Concurrency**: parallel appends are all kept, parallel closes have one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh store seeded with [`fixture_routines`] for each test:
//!
//! ```ignore
//! use gymtrack_storage::conformance::{fixture_routines, run_conformance_suite};
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_sqlite_storage(fixture_routines()).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod routine;
mod session;

use std::fmt;
use std::future::Future;

use crate::record::{RoutineExercise, RoutineRecord, SeriesRecord, SessionClose};
use crate::{RoutineStore, SessionStore};

/// Routine id of the fixture routine with two exercises.
pub const FIXTURE_ROUTINE_ID: i64 = 1;
/// Routine id of the fixture routine with no exercises.
pub const EMPTY_ROUTINE_ID: i64 = 2;
/// A routine id that is never seeded.
pub const MISSING_ROUTINE_ID: i64 = 999;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "routine", "session", "error").
    pub category: String,
    /// Test name (e.g. "append_preserves_insertion_order").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// The `factory` function is called once per test and must return a fresh
/// store seeded with exactly the routines from [`fixture_routines`].
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RoutineStore + SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(routine::run_routine_tests(&factory).await);
    results.extend(session::run_session_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// The routines every store under test must be seeded with.
pub fn fixture_routines() -> Vec<RoutineRecord> {
    vec![
        RoutineRecord {
            id: FIXTURE_ROUTINE_ID,
            name: "Push day".to_string(),
            exercises: vec![
                RoutineExercise {
                    exercise_id: 10,
                    name: "Bench press".to_string(),
                    target_series: 3,
                    target_reps: Some(8),
                    suggested_weight: Some(60.0),
                    rest_seconds: Some(90),
                },
                RoutineExercise {
                    exercise_id: 11,
                    name: "Dips".to_string(),
                    target_series: 2,
                    target_reps: Some(12),
                    suggested_weight: None,
                    rest_seconds: None,
                },
            ],
        },
        RoutineRecord {
            id: EMPTY_ROUTINE_ID,
            name: "Rest day".to_string(),
            exercises: vec![],
        },
    ]
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_series(exercise_id: i64, series_index: u32, reps: u32) -> SeriesRecord {
    SeriesRecord {
        exercise_id,
        series_index,
        reps_performed: reps,
        weight_used: Some(40.0),
        note: None,
    }
}

fn make_close(note: Option<&str>) -> SessionClose {
    SessionClose {
        finished_at: "2025-01-01T01:00:00Z".to_string(),
        note: note.map(str::to_string),
    }
}
