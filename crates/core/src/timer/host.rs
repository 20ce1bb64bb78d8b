//! Background timer host.
//!
//! One task owns the [`TimerEngine`] and is its only writer. Handles talk to
//! it over an unbounded command channel, so `start`/`stop`/`extend` never
//! wait. Events go out over one unbounded channel per attached listener;
//! a listener whose receiver is gone is pruned on the next delivery.
//!
//! The task lives as long as at least one [`TimerHost`] handle does, which is
//! what lets a countdown survive any single page view.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};

use super::engine::{Tick, TimerEngine, TimerState};
use super::{RunId, TimerError};
use crate::notify::{Notification, Notifier};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// What listeners receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    Tick { run_id: RunId, remaining_seconds: u64 },
    Finished { run_id: RunId },
}

impl TimerEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            TimerEvent::Tick { run_id, .. } | TimerEvent::Finished { run_id } => *run_id,
        }
    }

    /// Event name as used on the wire (`"tick"` / `"finished"`).
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::Tick { .. } => "tick",
            TimerEvent::Finished { .. } => "finished",
        }
    }
}

/// Name under which a listener is attached. Re-using a name after the old
/// receiver is gone (a page reload) attaches afresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ListenerId {
    fn from(s: &str) -> Self {
        ListenerId(s.to_string())
    }
}

impl From<String> for ListenerId {
    fn from(s: String) -> Self {
        ListenerId(s)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text of the notification fired when a run finishes.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub finished_title: String,
    pub finished_body: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            finished_title: "Rest finished!".to_string(),
            finished_body: "Time to start your next series.".to_string(),
        }
    }
}

enum Command {
    Start {
        run_id: RunId,
        duration_seconds: u64,
        deep_link: Option<String>,
    },
    /// `run_id: None` stops whatever is running.
    Stop { run_id: Option<RunId> },
    Extend {
        run_id: Option<RunId>,
        delta_seconds: i64,
    },
    Attach {
        id: ListenerId,
        sink: mpsc::UnboundedSender<TimerEvent>,
    },
    Detach { id: ListenerId },
    CurrentState { reply: oneshot::Sender<TimerState> },
    ListenerCount { reply: oneshot::Sender<usize> },
}

/// Cloneable handle to the background timer.
#[derive(Clone)]
pub struct TimerHost {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<TimerState>,
    next_run: Arc<AtomicU64>,
}

impl TimerHost {
    /// Spawn the host task on the current tokio runtime.
    pub fn spawn(config: HostConfig, notifier: Arc<dyn Notifier>) -> Self {
        let engine = TimerEngine::new();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(engine.state());

        let task = HostTask {
            engine,
            listeners: HashMap::new(),
            ticker: None,
            deep_link: None,
            config,
            notifier,
            state: state_tx,
        };
        tokio::spawn(task.run(receiver));

        Self {
            commands,
            state,
            next_run: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a countdown, replacing any run in progress. Returns the id the
    /// run's events will carry.
    pub fn start(
        &self,
        duration_seconds: u64,
        deep_link: Option<String>,
    ) -> Result<RunId, TimerError> {
        if duration_seconds == 0 {
            return Err(TimerError::ZeroDuration);
        }
        let run_id = RunId(self.next_run.fetch_add(1, Ordering::Relaxed) + 1);
        self.send(Command::Start {
            run_id,
            duration_seconds,
            deep_link,
        })?;
        Ok(run_id)
    }

    /// Stop whatever is running. Stopping an idle timer is a no-op.
    pub fn stop(&self) -> Result<(), TimerError> {
        self.send(Command::Stop { run_id: None })
    }

    /// Stop only if `run_id` is still the current run.
    pub fn stop_run(&self, run_id: RunId) -> Result<(), TimerError> {
        self.send(Command::Stop {
            run_id: Some(run_id),
        })
    }

    pub fn extend(&self, delta_seconds: i64) -> Result<(), TimerError> {
        self.send(Command::Extend {
            run_id: None,
            delta_seconds,
        })
    }

    /// Extend only if `run_id` is still the current run.
    pub fn extend_run(&self, run_id: RunId, delta_seconds: i64) -> Result<(), TimerError> {
        self.send(Command::Extend {
            run_id: Some(run_id),
            delta_seconds,
        })
    }

    /// Attach `sink` under `id`. If a live listener is already attached under
    /// that id this is a no-op and `sink` is dropped. While a run is in
    /// progress the new listener is sent the current remaining time at once.
    pub fn attach(
        &self,
        id: impl Into<ListenerId>,
        sink: mpsc::UnboundedSender<TimerEvent>,
    ) -> Result<(), TimerError> {
        self.send(Command::Attach {
            id: id.into(),
            sink,
        })
    }

    /// Attach a fresh channel under `id` and return its receiving side.
    ///
    /// When `id` is already attached the returned subscription yields no
    /// events and reports closed.
    pub fn subscribe(&self, id: impl Into<ListenerId>) -> Result<TimerSubscription, TimerError> {
        let id = id.into();
        let (sink, events) = mpsc::unbounded_channel();
        self.attach(id.clone(), sink)?;
        Ok(TimerSubscription { id, events })
    }

    /// Detach `id`. Detaching an unknown id is a no-op.
    pub fn detach(&self, id: impl Into<ListenerId>) -> Result<(), TimerError> {
        self.send(Command::Detach { id: id.into() })
    }

    /// Last published state. Never waits; may lag the host by one command.
    pub fn state(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// State after every command sent so far has been applied.
    pub async fn current_state(&self) -> Result<TimerState, TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CurrentState { reply })?;
        rx.await.map_err(|_| TimerError::HostClosed)
    }

    /// Number of live listeners.
    pub async fn listener_count(&self) -> Result<usize, TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListenerCount { reply })?;
        rx.await.map_err(|_| TimerError::HostClosed)
    }

    fn send(&self, command: Command) -> Result<(), TimerError> {
        self.commands
            .send(command)
            .map_err(|_| TimerError::HostClosed)
    }
}

/// Receiving side of an attached listener.
#[derive(Debug)]
pub struct TimerSubscription {
    id: ListenerId,
    events: mpsc::UnboundedReceiver<TimerEvent>,
}

impl TimerSubscription {
    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    /// Next event, or `None` once the listener has been detached.
    pub async fn next_event(&mut self) -> Option<TimerEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<TimerEvent> {
        self.events.try_recv().ok()
    }

    pub fn into_receiver(self) -> mpsc::UnboundedReceiver<TimerEvent> {
        self.events
    }
}

struct HostTask {
    engine: TimerEngine,
    listeners: HashMap<ListenerId, mpsc::UnboundedSender<TimerEvent>>,
    ticker: Option<Interval>,
    deep_link: Option<String>,
    config: HostConfig,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<TimerState>,
}

impl HostTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!("timer host started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => self.advance(Instant::now()),
            }
        }
        tracing::debug!("timer host stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Start {
                run_id,
                duration_seconds,
                deep_link,
            } => {
                if let Some(previous) = self.running_run() {
                    tracing::debug!(%previous, %run_id, "replacing running rest timer");
                }
                if let Err(err) = self.engine.start(run_id, duration_seconds, now) {
                    tracing::warn!(%run_id, error = %err, "rest timer not started");
                    return;
                }
                self.deep_link = deep_link;
                let mut ticker = tokio::time::interval_at(now + TICK_PERIOD, TICK_PERIOD);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
                tracing::info!(%run_id, duration_seconds, "rest timer started");

                self.broadcast(TimerEvent::Tick {
                    run_id,
                    remaining_seconds: duration_seconds,
                });
                self.publish();
            }
            Command::Stop { run_id } => {
                if !self.is_current(run_id) {
                    tracing::debug!(?run_id, "stop ignored for a stale run");
                    return;
                }
                if self.engine.stop() {
                    self.ticker = None;
                    tracing::info!(run_id = ?self.engine.run_id(), "rest timer stopped");
                    self.publish();
                }
            }
            Command::Extend {
                run_id,
                delta_seconds,
            } => {
                if !self.is_current(run_id) {
                    tracing::debug!(?run_id, "extend ignored for a stale run");
                    return;
                }
                if self.engine.extend(delta_seconds, now) {
                    tracing::info!(run_id = ?self.engine.run_id(), delta_seconds, "rest timer extended");
                    self.advance(now);
                }
            }
            Command::Attach { id, sink } => {
                let live = self.listeners.get(&id).is_some_and(|s| !s.is_closed());
                if live {
                    tracing::debug!(listener = %id, "listener already attached");
                    return;
                }
                if let (Some(run_id), Some(remaining_seconds)) =
                    (self.engine.run_id(), self.engine.peek(now))
                {
                    let _ = sink.send(TimerEvent::Tick {
                        run_id,
                        remaining_seconds,
                    });
                }
                tracing::debug!(listener = %id, "listener attached");
                self.listeners.insert(id, sink);
            }
            Command::Detach { id } => {
                if self.listeners.remove(&id).is_some() {
                    tracing::debug!(listener = %id, "listener detached");
                }
            }
            Command::CurrentState { reply } => {
                let _ = reply.send(self.engine.state());
            }
            Command::ListenerCount { reply } => {
                self.listeners.retain(|_, sink| !sink.is_closed());
                let _ = reply.send(self.listeners.len());
            }
        }
    }

    /// Recompute the countdown and tell every listener.
    fn advance(&mut self, now: Instant) {
        let Some(run_id) = self.engine.run_id() else {
            self.ticker = None;
            return;
        };
        match self.engine.tick(now) {
            Tick::Idle => self.ticker = None,
            Tick::Remaining(remaining_seconds) => self.broadcast(TimerEvent::Tick {
                run_id,
                remaining_seconds,
            }),
            Tick::Finished => {
                self.ticker = None;
                self.broadcast(TimerEvent::Tick {
                    run_id,
                    remaining_seconds: 0,
                });
                self.broadcast(TimerEvent::Finished { run_id });
                tracing::info!(%run_id, listeners = self.listeners.len(), "rest timer finished");
                self.notify_finished(run_id);
            }
        }
        self.publish();
    }

    fn broadcast(&mut self, event: TimerEvent) {
        self.listeners.retain(|id, sink| {
            let delivered = sink.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!(listener = %id, "pruning detached listener");
            }
            delivered
        });
    }

    fn notify_finished(&mut self, run_id: RunId) {
        let notification = Notification {
            title: self.config.finished_title.clone(),
            body: self.config.finished_body.clone(),
            deep_link: self.deep_link.take(),
        };
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&notification).await {
                tracing::warn!(%run_id, error = %err, "rest notification not delivered");
            }
        });
    }

    fn running_run(&self) -> Option<RunId> {
        self.engine.run_id().filter(|_| self.engine.is_running())
    }

    fn is_current(&self, run_id: Option<RunId>) -> bool {
        match run_id {
            Some(run_id) => self.engine.run_id() == Some(run_id),
            None => true,
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.engine.state());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
