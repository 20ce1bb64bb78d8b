//! The rest timer: a pure countdown engine and the background host that
//! drives it and fans its events out to attached listeners.

mod engine;
mod host;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::{Tick, TimerEngine, TimerState};
pub use host::{HostConfig, ListenerId, TimerEvent, TimerHost, TimerSubscription};

/// Identifies one `start` of the timer. Strictly increasing per host, so an
/// event can be matched to the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer duration must be a positive number of seconds")]
    ZeroDuration,

    /// The host task has exited; no command can reach it any more.
    #[error("timer host is no longer running")]
    HostClosed,
}
