//! Workout session progression.
//!
//! A [`SessionController`] walks one routine exercise by exercise and series
//! by series:
//!
//! ```text
//! AwaitingSeriesInput -> SeriesRecorded -> Resting -> AwaitingSeriesInput ...
//!                                       \-> AwaitingSeriesInput (next exercise)
//!                                       \-> SessionComplete (last series)
//! ```
//!
//! Every transition that touches the store or the timer performs that call
//! first and only then updates in-memory state, so a failed call leaves the
//! controller exactly as it was.

mod error;
mod state;

use std::sync::Arc;

use gymtrack_storage::{
    now_rfc3339, RoutineExercise, RoutineStore, SeriesRecord, SessionClose, SessionStore,
};

use crate::timer::{RunId, TimerEvent, TimerHost};

pub use error::SessionError;
pub use state::{
    ExerciseProgress, SeriesDefaults, SeriesInput, SessionConfig, SessionState, SessionView,
};

pub struct SessionController {
    sessions: Arc<dyn SessionStore>,
    timer: TimerHost,
    config: SessionConfig,
    session_id: i64,
    routine_id: i64,
    started_at: String,
    finished_at: Option<String>,
    general_note: Option<String>,
    exercises: Vec<RoutineExercise>,
    records: Vec<SeriesRecord>,
    /// Index into `records` where the current exercise slot began. A
    /// routine may list the same exercise more than once.
    slot_start: usize,
    rest_remaining: Option<u64>,
    state: SessionState,
}

impl SessionController {
    /// Start a session for `routine_id`, positioned at exercise 1, series 1.
    pub async fn begin(
        routines: &dyn RoutineStore,
        sessions: Arc<dyn SessionStore>,
        timer: TimerHost,
        config: SessionConfig,
        routine_id: i64,
    ) -> Result<Self, SessionError> {
        let exercises = routines.get_routine_exercises(routine_id).await?;
        let Some(first) = exercises.first() else {
            return Err(SessionError::Validation(format!(
                "routine {routine_id} has no exercises"
            )));
        };
        let defaults = SeriesDefaults {
            reps: first.target_reps,
            weight: first.suggested_weight,
        };

        let session_id = sessions.create_session(routine_id).await?;
        let record = sessions.get_session(session_id).await?;
        tracing::info!(session_id, routine_id, exercises = exercises.len(), "session started");

        Ok(Self {
            sessions,
            timer,
            config,
            session_id,
            routine_id,
            started_at: record.started_at,
            finished_at: None,
            general_note: None,
            exercises,
            records: Vec::new(),
            slot_start: 0,
            rest_remaining: None,
            state: SessionState::AwaitingSeriesInput {
                exercise_index: 0,
                series_index: 1,
                defaults,
            },
        })
    }

    pub fn id(&self) -> i64 {
        self.session_id
    }

    pub fn routine_id(&self) -> i64 {
        self.routine_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    pub fn exercises(&self) -> &[RoutineExercise] {
        &self.exercises
    }

    pub fn general_note(&self) -> Option<&str> {
        self.general_note.as_deref()
    }

    pub fn finished_at(&self) -> Option<&str> {
        self.finished_at.as_deref()
    }

    /// Last known remaining rest, while resting.
    pub fn rest_remaining(&self) -> Option<u64> {
        self.rest_remaining
    }

    /// The timer run this session is resting on, if any.
    pub fn rest_run(&self) -> Option<RunId> {
        match self.state {
            SessionState::Resting { run_id, .. } => Some(run_id),
            _ => None,
        }
    }

    pub fn current_exercise(&self) -> Option<&RoutineExercise> {
        self.state
            .exercise_index()
            .and_then(|i| self.exercises.get(i))
    }

    /// Record the series being awaited.
    pub async fn record_series(&mut self, input: SeriesInput) -> Result<(), SessionError> {
        let SessionState::AwaitingSeriesInput {
            exercise_index,
            series_index,
            ..
        } = self.state
        else {
            return Err(self.invalid("record a series"));
        };
        let reps = validate_reps(input.reps)?;
        let weight = validate_weight(input.weight)?;
        let note = input
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let record = SeriesRecord {
            exercise_id: self.exercises[exercise_index].exercise_id,
            series_index,
            reps_performed: reps,
            weight_used: weight,
            note,
        };
        self.sessions
            .append_series_record(self.session_id, record.clone())
            .await?;

        tracing::debug!(
            session_id = self.session_id,
            exercise_id = record.exercise_id,
            series_index,
            reps,
            "series recorded"
        );
        self.records.push(record);
        self.state = SessionState::SeriesRecorded {
            exercise_index,
            series_index,
        };
        Ok(())
    }

    /// Move on from a recorded series: rest, next exercise, or close.
    pub async fn advance(&mut self) -> Result<(), SessionError> {
        let SessionState::SeriesRecorded {
            exercise_index,
            series_index,
        } = self.state
        else {
            return Err(self.invalid("advance"));
        };
        let exercise = &self.exercises[exercise_index];

        if series_index < exercise.target_series {
            let rest_seconds = u64::from(
                exercise
                    .rest_seconds
                    .filter(|s| *s > 0)
                    .unwrap_or(self.config.default_rest_seconds),
            );
            let deep_link = format!("/sessions/{}", self.session_id);
            let run_id = self.timer.start(rest_seconds, Some(deep_link))?;
            tracing::debug!(session_id = self.session_id, %run_id, rest_seconds, "resting");
            self.rest_remaining = Some(rest_seconds);
            self.state = SessionState::Resting {
                exercise_index,
                series_index,
                run_id,
                rest_seconds,
            };
        } else if let Some(next) = self.exercises.get(exercise_index + 1) {
            let defaults = SeriesDefaults {
                reps: next.target_reps,
                weight: next.suggested_weight,
            };
            self.slot_start = self.records.len();
            self.state = SessionState::AwaitingSeriesInput {
                exercise_index: exercise_index + 1,
                series_index: 1,
                defaults,
            };
        } else {
            let note = self.general_note.clone();
            self.close(note).await?;
        }
        Ok(())
    }

    /// Feed a timer event in. Returns true when it ended this session's rest.
    pub fn handle_timer_event(&mut self, event: &TimerEvent) -> bool {
        if self.rest_run() != Some(event.run_id()) {
            return false;
        }
        match event {
            TimerEvent::Tick {
                remaining_seconds, ..
            } => {
                self.rest_remaining = Some(*remaining_seconds);
                false
            }
            TimerEvent::Finished { .. } => {
                self.end_rest();
                true
            }
        }
    }

    /// Lengthen (or with a negative delta, shorten) the current rest.
    pub fn extend_rest(&mut self, delta_seconds: i64) -> Result<(), SessionError> {
        let Some(run_id) = self.rest_run() else {
            return Err(self.invalid("extend rest"));
        };
        self.timer.extend_run(run_id, delta_seconds)?;
        self.rest_remaining = self
            .rest_remaining
            .map(|r| r.saturating_add_signed(delta_seconds));
        Ok(())
    }

    /// End the current rest now, as if the timer had finished.
    pub fn skip_rest(&mut self) -> Result<(), SessionError> {
        let Some(run_id) = self.rest_run() else {
            return Err(self.invalid("skip rest"));
        };
        self.timer.stop_run(run_id)?;
        tracing::debug!(session_id = self.session_id, %run_id, "rest skipped");
        self.end_rest();
        Ok(())
    }

    /// Set the note attached when the session closes. Blank clears it.
    pub fn set_general_note(&mut self, note: Option<String>) -> Result<(), SessionError> {
        if self.state.is_complete() {
            return Err(self.invalid("change the note"));
        }
        self.general_note = normalize_note(note);
        Ok(())
    }

    /// Close the session now, whatever its progress. `note` replaces the
    /// general note when given. A completed session is left as is.
    pub async fn finalize(&mut self, note: Option<String>) -> Result<(), SessionError> {
        if self.state.is_complete() {
            return Ok(());
        }
        let note = normalize_note(note).or_else(|| self.general_note.clone());
        self.close(note).await
    }

    pub fn progress(&self) -> ExerciseProgress {
        let count = self.exercises.len().max(1);
        let exercise_index = self
            .state
            .exercise_index()
            .unwrap_or(self.exercises.len().saturating_sub(1));
        let Some(exercise) = self.exercises.get(exercise_index) else {
            return ExerciseProgress {
                exercise_index,
                current_series_index: 0,
                is_exercise_complete: true,
                overall_percent: 100.0,
            };
        };

        let done = self.slot_records().len() as u32;
        let is_exercise_complete = done >= exercise.target_series;
        let current_series_index = match self.state {
            SessionState::AwaitingSeriesInput { .. } => done + 1,
            _ => done,
        };
        let overall_percent = if self.state.is_complete() {
            100.0
        } else {
            let within = if exercise.target_series == 0 {
                1.0
            } else {
                f64::from(done.min(exercise.target_series)) / f64::from(exercise.target_series)
            };
            (exercise_index as f64 + within) / count as f64 * 100.0
        };

        ExerciseProgress {
            exercise_index,
            current_series_index,
            is_exercise_complete,
            overall_percent,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            routine_id: self.routine_id,
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            general_note: self.general_note.clone(),
            state: self.state.clone(),
            progress: self.progress(),
            rest_remaining_seconds: self.rest_remaining,
            current_exercise: self.current_exercise().cloned(),
            exercises: self.exercises.clone(),
            completed_series: self.records.clone(),
        }
    }

    async fn close(&mut self, note: Option<String>) -> Result<(), SessionError> {
        let close = SessionClose {
            finished_at: now_rfc3339(),
            note: note.clone(),
        };
        let finished_at = close.finished_at.clone();
        self.sessions.close_session(self.session_id, close).await?;

        if let Some(run_id) = self.rest_run() {
            if let Err(err) = self.timer.stop_run(run_id) {
                tracing::warn!(session_id = self.session_id, %run_id, error = %err, "rest timer not stopped");
            }
        }
        tracing::info!(
            session_id = self.session_id,
            series = self.records.len(),
            "session closed"
        );
        self.general_note = note;
        self.finished_at = Some(finished_at);
        self.rest_remaining = None;
        self.state = SessionState::SessionComplete;
        Ok(())
    }

    fn end_rest(&mut self) {
        let SessionState::Resting {
            exercise_index,
            series_index,
            ..
        } = self.state
        else {
            return;
        };
        let exercise = &self.exercises[exercise_index];
        let weight = self
            .slot_records()
            .last()
            .map_or(exercise.suggested_weight, |r| r.weight_used);

        self.rest_remaining = None;
        self.state = SessionState::AwaitingSeriesInput {
            exercise_index,
            series_index: series_index + 1,
            defaults: SeriesDefaults {
                reps: exercise.target_reps,
                weight,
            },
        };
    }

    /// Records of the current exercise slot.
    fn slot_records(&self) -> &[SeriesRecord] {
        self.records.get(self.slot_start..).unwrap_or_default()
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}

fn validate_reps(reps: Option<i64>) -> Result<u32, SessionError> {
    let reps = reps.ok_or_else(|| SessionError::Validation("reps is required".into()))?;
    match u32::try_from(reps) {
        Ok(r) if r > 0 => Ok(r),
        _ => Err(SessionError::Validation(format!(
            "reps must be a positive integer, got {reps}"
        ))),
    }
}

fn validate_weight(weight: Option<f64>) -> Result<Option<f64>, SessionError> {
    match weight {
        Some(w) if !w.is_finite() || w < 0.0 => Err(SessionError::Validation(format!(
            "weight must be a non-negative number, got {w}"
        ))),
        other => Ok(other),
    }
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
