use gymtrack_storage::{RoutineExercise, SeriesRecord};
use serde::{Deserialize, Serialize};

use crate::timer::RunId;

/// Pre-filled values for the next series input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesDefaults {
    pub reps: Option<u32>,
    pub weight: Option<f64>,
}

/// Where a session is in its progression. Indices are 0-based for
/// exercises and 1-based for series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    AwaitingSeriesInput {
        exercise_index: usize,
        series_index: u32,
        defaults: SeriesDefaults,
    },
    /// `series_index` is the series just recorded.
    SeriesRecorded {
        exercise_index: usize,
        series_index: u32,
    },
    /// Resting after `series_index`, on timer run `run_id`.
    Resting {
        exercise_index: usize,
        series_index: u32,
        run_id: RunId,
        rest_seconds: u64,
    },
    SessionComplete,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingSeriesInput { .. } => "awaiting_series_input",
            SessionState::SeriesRecorded { .. } => "series_recorded",
            SessionState::Resting { .. } => "resting",
            SessionState::SessionComplete => "session_complete",
        }
    }

    pub fn exercise_index(&self) -> Option<usize> {
        match self {
            SessionState::AwaitingSeriesInput { exercise_index, .. }
            | SessionState::SeriesRecorded { exercise_index, .. }
            | SessionState::Resting { exercise_index, .. } => Some(*exercise_index),
            SessionState::SessionComplete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SessionState::SessionComplete)
    }
}

/// Derived progress through the current exercise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExerciseProgress {
    pub exercise_index: usize,
    /// 1-based. The series being entered, or the one just recorded.
    pub current_series_index: u32,
    pub is_exercise_complete: bool,
    /// Share of the routine done, 0 to 100.
    pub overall_percent: f64,
}

/// Raw input for one series, validated by the controller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeriesInput {
    #[serde(default)]
    pub reps: Option<i64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl SeriesInput {
    pub fn reps(reps: i64) -> Self {
        Self {
            reps: Some(reps),
            ..Self::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Rest applied when an exercise has none configured.
    pub default_rest_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: 60,
        }
    }
}

/// Everything a page needs to render a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: i64,
    pub routine_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub general_note: Option<String>,
    #[serde(flatten)]
    pub state: SessionState,
    pub progress: ExerciseProgress,
    pub rest_remaining_seconds: Option<u64>,
    pub current_exercise: Option<RoutineExercise>,
    pub exercises: Vec<RoutineExercise>,
    pub completed_series: Vec<SeriesRecord>,
}
