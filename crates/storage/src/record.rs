use serde::{Deserialize, Serialize};

/// One exercise slot of a routine, in routine order.
///
/// Read-only input to a workout session: the controller never writes these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub exercise_id: i64,
    #[serde(default)]
    pub name: String,
    pub target_series: u32,
    #[serde(default)]
    pub target_reps: Option<u32>,
    #[serde(default)]
    pub suggested_weight: Option<f64>,
    /// Rest between series in seconds. None means the session default applies.
    #[serde(default)]
    pub rest_seconds: Option<u32>,
}

/// A named, ordered template of exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<RoutineExercise>,
}

/// One completed series within a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub exercise_id: i64,
    /// 1-based index of the series within its exercise.
    pub series_index: u32,
    pub reps_performed: u32,
    pub weight_used: Option<f64>,
    pub note: Option<String>,
}

/// A workout session as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub routine_id: i64,
    /// RFC 3339 timestamp string.
    pub started_at: String,
    /// RFC 3339 timestamp string. None while the session is open.
    pub finished_at: Option<String>,
    pub general_note: Option<String>,
    /// Insertion order is chronological order is display order.
    pub completed_series: Vec<SeriesRecord>,
}

impl SessionRecord {
    pub fn is_closed(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Payload of a close call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClose {
    /// RFC 3339 timestamp string.
    pub finished_at: String,
    pub note: Option<String>,
}

/// Current UTC time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
