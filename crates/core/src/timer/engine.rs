//! Countdown state machine.
//!
//! The engine knows nothing about tasks or channels: every method takes the
//! current instant explicitly, so the host decides when time passes and tests
//! can drive it with hand-picked instants.

use serde::Serialize;
use tokio::time::{Duration, Instant};

use super::{RunId, TimerError};

/// Snapshot of the countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerState {
    /// Deadline of the current (or last) run. Not serialized: instants are
    /// process-local.
    #[serde(skip)]
    pub end_timestamp: Option<Instant>,
    pub remaining_seconds: u64,
    pub running: bool,
    /// Id of the current (or last) run. `None` before the first start.
    pub run_id: Option<RunId>,
    /// Duration the current run was started with.
    pub duration_seconds: u64,
}

/// What a tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing is running.
    Idle,
    /// Still counting down.
    Remaining(u64),
    /// The run reached zero on this tick. Produced once per run.
    Finished,
}

#[derive(Debug, Default)]
pub struct TimerEngine {
    end: Option<Instant>,
    remaining_seconds: u64,
    running: bool,
    run_id: Option<RunId>,
    duration_seconds: u64,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown, replacing any run in progress.
    pub fn start(
        &mut self,
        run_id: RunId,
        duration_seconds: u64,
        now: Instant,
    ) -> Result<(), TimerError> {
        if duration_seconds == 0 {
            return Err(TimerError::ZeroDuration);
        }
        self.end = Some(now + Duration::from_secs(duration_seconds));
        self.remaining_seconds = duration_seconds;
        self.running = true;
        self.run_id = Some(run_id);
        self.duration_seconds = duration_seconds;
        Ok(())
    }

    /// Halt the countdown. Returns whether a run was actually stopped.
    ///
    /// `remaining_seconds` keeps its last computed value.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Shift the deadline by `delta_seconds`. The deadline never moves before
    /// `now`, so the remaining time floors at zero. Returns whether anything
    /// changed; a stopped engine ignores the call.
    pub fn extend(&mut self, delta_seconds: i64, now: Instant) -> bool {
        let Some(end) = self.end.filter(|_| self.running) else {
            return false;
        };
        let shift = Duration::from_secs(delta_seconds.unsigned_abs());
        let new_end = if delta_seconds >= 0 {
            end + shift
        } else {
            end.checked_sub(shift).unwrap_or(now).max(now)
        };
        self.end = Some(new_end);
        self.remaining_seconds = remaining_at(new_end, now);
        true
    }

    /// Recompute the remaining time. Completion is reported exactly once:
    /// the tick that reaches zero also stops the engine.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let Some(end) = self.end.filter(|_| self.running) else {
            return Tick::Idle;
        };
        self.remaining_seconds = remaining_at(end, now);
        if self.remaining_seconds == 0 {
            self.running = false;
            Tick::Finished
        } else {
            Tick::Remaining(self.remaining_seconds)
        }
    }

    /// Remaining seconds as of `now`, without touching state.
    pub fn peek(&self, now: Instant) -> Option<u64> {
        self.end
            .filter(|_| self.running)
            .map(|end| remaining_at(end, now))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn state(&self) -> TimerState {
        TimerState {
            end_timestamp: self.end,
            remaining_seconds: self.remaining_seconds,
            running: self.running,
            run_id: self.run_id,
            duration_seconds: self.duration_seconds,
        }
    }
}

/// Whole seconds left until `end`, rounded up, so zero is only reported at
/// or after the deadline.
fn remaining_at(end: Instant, now: Instant) -> u64 {
    let left = end.saturating_duration_since(now).as_nanos();
    let secs = left.div_ceil(1_000_000_000);
    u64::try_from(secs).unwrap_or(u64::MAX)
}
