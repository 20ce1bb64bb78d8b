//! gymtrack-core: rest timer and workout session state machines.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`TimerEngine`] -- countdown state driven by an explicit clock
//! - [`TimerHost`] -- background task owning the single timer, fanning out
//!   [`TimerEvent`]s to attached listeners
//! - [`SessionController`] -- exercise/series progression of one session
//! - [`Notifier`] -- delivery contract for the "rest finished" notification

pub mod notify;
pub mod session;
pub mod timer;

#[cfg(test)]
mod testing;

// ── Convenience re-exports: key types ────────────────────────────────

pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use session::{
    ExerciseProgress, SeriesDefaults, SeriesInput, SessionConfig, SessionController,
    SessionError, SessionState, SessionView,
};
pub use timer::{
    HostConfig, ListenerId, RunId, TimerEngine, TimerError, TimerEvent, TimerHost, TimerState,
    TimerSubscription,
};
