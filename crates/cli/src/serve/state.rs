//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use gymtrack_core::{SessionConfig, SessionController, TimerHost};
use gymtrack_storage::MemoryStorage;
use tokio::sync::{watch, Mutex, RwLock};

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    /// Request counts per IP per window.
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Check if a request from the given IP is allowed.
    /// Returns Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        let entry = tracker.entry(ip).or_insert((0, now));

        // Reset window if expired
        let elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

/// A live session. Each sits behind its own lock so one slow store call
/// does not hold up the others.
pub(crate) type SharedSession = Arc<Mutex<SessionController>>;

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// Routines (seeded from config) and session records.
    pub(crate) storage: Arc<MemoryStorage>,
    /// The one rest timer of this process.
    pub(crate) timer: TimerHost,
    /// Live sessions keyed by session id.
    pub(crate) sessions: RwLock<HashMap<i64, SharedSession>>,
    pub(crate) session_config: SessionConfig,
    /// Per-IP rate limiter.
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
    /// Flipped to true once the server starts shutting down.
    pub(crate) shutdown: watch::Sender<bool>,
}

impl AppState {
    pub(crate) async fn session(&self, id: i64) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub(crate) async fn all_sessions(&self) -> Vec<SharedSession> {
        self.sessions.read().await.values().cloned().collect()
    }
}
