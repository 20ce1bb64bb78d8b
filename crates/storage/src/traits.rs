use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{RoutineExercise, SeriesRecord, SessionClose, SessionRecord};

/// Read-only access to routine definitions.
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RoutineStore: Send + Sync + 'static {
    /// The routine's exercises in routine order.
    ///
    /// Returns `Err(StorageError::RoutineNotFound)` if the routine does not exist.
    /// An existing routine with no exercises yields an empty vector.
    async fn get_routine_exercises(
        &self,
        routine_id: i64,
    ) -> Result<Vec<RoutineExercise>, StorageError>;
}

/// Durable storage for workout sessions.
///
/// ## Append-only semantics
///
/// A session is created open, grows by `append_series_record` calls, and is
/// closed exactly once by `close_session`. After closing, both
/// `append_series_record` and `close_session` return
/// `Err(StorageError::SessionClosed)` and leave the record untouched.
///
/// ## Failure atomicity
///
/// A call that returns an error MUST NOT have changed the stored session.
/// Callers rely on this to retry the same action after a failure.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Create an open session for a routine and return its id.
    ///
    /// The store stamps `started_at`. Returns
    /// `Err(StorageError::RoutineNotFound)` if the routine does not exist.
    async fn create_session(&self, routine_id: i64) -> Result<i64, StorageError>;

    /// Append a series to an open session.
    async fn append_series_record(
        &self,
        session_id: i64,
        record: SeriesRecord,
    ) -> Result<(), StorageError>;

    /// Close an open session, setting `finished_at` and the general note.
    async fn close_session(&self, session_id: i64, close: SessionClose)
        -> Result<(), StorageError>;

    /// Read a session back, series included.
    ///
    /// Returns `Err(StorageError::SessionNotFound)` if not found.
    async fn get_session(&self, session_id: i64) -> Result<SessionRecord, StorageError>;
}
