use gymtrack_storage::StorageError;

use crate::timer::TimerError;

/// Errors surfaced by a workout session.
///
/// None of them leave the session in a half-applied state: the transition
/// that failed simply did not happen.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Malformed input. Nothing was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Persistence or timer failure. The caller may retry the same action.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RoutineNotFound { routine_id } => {
                SessionError::NotFound(format!("routine {routine_id}"))
            }
            StorageError::SessionNotFound { session_id } => {
                SessionError::NotFound(format!("session {session_id}"))
            }
            other => SessionError::OperationFailed(other.to_string()),
        }
    }
}

impl From<TimerError> for SessionError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::ZeroDuration => SessionError::Validation(err.to_string()),
            TimerError::HostClosed => SessionError::OperationFailed(err.to_string()),
        }
    }
}
