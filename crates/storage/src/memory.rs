//! In-memory store backend.
//!
//! Backs both [`RoutineStore`] and [`SessionStore`] with maps behind async
//! read/write locks. Routines are seeded up front (from configuration or a
//! test fixture); sessions live for the lifetime of the process.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{
    now_rfc3339, RoutineExercise, RoutineRecord, SeriesRecord, SessionClose, SessionRecord,
};
use crate::traits::{RoutineStore, SessionStore};

#[derive(Default)]
struct Sessions {
    next_id: i64,
    by_id: BTreeMap<i64, SessionRecord>,
}

/// A process-local store for routines and sessions.
#[derive(Default)]
pub struct MemoryStorage {
    routines: RwLock<BTreeMap<i64, RoutineRecord>>,
    sessions: RwLock<Sessions>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with routines. A later routine with the
    /// same id replaces an earlier one.
    pub fn with_routines(routines: impl IntoIterator<Item = RoutineRecord>) -> Self {
        let by_id = routines.into_iter().map(|r| (r.id, r)).collect();
        Self {
            routines: RwLock::new(by_id),
            sessions: RwLock::new(Sessions::default()),
        }
    }

    /// Insert or replace a routine.
    pub async fn insert_routine(&self, routine: RoutineRecord) {
        self.routines.write().await.insert(routine.id, routine);
    }

    /// All routines, ordered by id.
    pub async fn list_routines(&self) -> Vec<RoutineRecord> {
        self.routines.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RoutineStore for MemoryStorage {
    async fn get_routine_exercises(
        &self,
        routine_id: i64,
    ) -> Result<Vec<RoutineExercise>, StorageError> {
        self.routines
            .read()
            .await
            .get(&routine_id)
            .map(|r| r.exercises.clone())
            .ok_or(StorageError::RoutineNotFound { routine_id })
    }
}

#[async_trait]
impl SessionStore for MemoryStorage {
    async fn create_session(&self, routine_id: i64) -> Result<i64, StorageError> {
        if !self.routines.read().await.contains_key(&routine_id) {
            return Err(StorageError::RoutineNotFound { routine_id });
        }

        let mut sessions = self.sessions.write().await;
        sessions.next_id += 1;
        let id = sessions.next_id;
        sessions.by_id.insert(
            id,
            SessionRecord {
                id,
                routine_id,
                started_at: now_rfc3339(),
                finished_at: None,
                general_note: None,
                completed_series: Vec::new(),
            },
        );
        tracing::debug!(session_id = id, routine_id, "session created");
        Ok(id)
    }

    async fn append_series_record(
        &self,
        session_id: i64,
        record: SeriesRecord,
    ) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .by_id
            .get_mut(&session_id)
            .ok_or(StorageError::SessionNotFound { session_id })?;
        if session.is_closed() {
            return Err(StorageError::SessionClosed { session_id });
        }
        session.completed_series.push(record);
        Ok(())
    }

    async fn close_session(
        &self,
        session_id: i64,
        close: SessionClose,
    ) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .by_id
            .get_mut(&session_id)
            .ok_or(StorageError::SessionNotFound { session_id })?;
        if session.is_closed() {
            return Err(StorageError::SessionClosed { session_id });
        }
        session.finished_at = Some(close.finished_at);
        session.general_note = close.note;
        tracing::debug!(
            session_id,
            series = session.completed_series.len(),
            "session closed"
        );
        Ok(())
    }

    async fn get_session(&self, session_id: i64) -> Result<SessionRecord, StorageError> {
        self.sessions
            .read()
            .await
            .by_id
            .get(&session_id)
            .cloned()
            .ok_or(StorageError::SessionNotFound { session_id })
    }
}
