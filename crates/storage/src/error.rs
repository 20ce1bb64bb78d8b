/// All errors that can be returned by a routine or session store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No routine with the given id exists in the store.
    #[error("routine not found: {routine_id}")]
    RoutineNotFound { routine_id: i64 },

    /// No session with the given id exists in the store.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: i64 },

    /// The session has already been closed; it accepts no more series and
    /// cannot be closed twice.
    #[error("session already closed: {session_id}")]
    SessionClosed { session_id: i64 },

    /// A backend-specific storage error (DB connection, network, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for the variants that mean "the referenced thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RoutineNotFound { .. } | StorageError::SessionNotFound { .. }
        )
    }
}
