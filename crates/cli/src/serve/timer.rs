//! Timer control channel and event stream.
//!
//! Pages send `{action: start|stop|extend}` commands and follow
//! `GET /timer/events` for `tick` and `finished` events. The stream is tied
//! to a listener id; reconnecting with the same id (after a reload) replaces
//! the previous connection. Page ids live under the `page:` prefix so a
//! client can never replace a listener the server attached itself.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use gymtrack_core::{TimerError, TimerSubscription};
use serde::Deserialize;

use super::json_error;
use super::state::AppState;

/// Counter for listeners that connect without choosing an id.
static ANONYMOUS_LISTENERS: AtomicU64 = AtomicU64::new(1);

/// Prefix of every listener id chosen by a page.
const PAGE_LISTENER_PREFIX: &str = "page:";

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum TimerCommand {
    Start {
        duration_seconds: u64,
        #[serde(default)]
        deep_link: Option<String>,
    },
    Stop,
    Extend {
        delta_seconds: i64,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsQuery {
    #[serde(default)]
    pub(crate) listener: Option<String>,
}

fn timer_error(err: TimerError) -> Response {
    let status = match err {
        TimerError::ZeroDuration => StatusCode::BAD_REQUEST,
        TimerError::HostClosed => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(status, &err.to_string()).into_response()
}

/// POST /timer
pub(crate) async fn handle_timer_command(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TimerCommand>, JsonRejection>,
) -> Response {
    let Json(command) = match payload {
        Ok(c) => c,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, &rejection.body_text()).into_response()
        }
    };

    let result = match command {
        TimerCommand::Start {
            duration_seconds,
            deep_link,
        } => state
            .timer
            .start(duration_seconds, deep_link)
            .map(|run_id| serde_json::json!({"accepted": true, "run_id": run_id})),
        TimerCommand::Stop => state
            .timer
            .stop()
            .map(|()| serde_json::json!({"accepted": true})),
        TimerCommand::Extend { delta_seconds } => state
            .timer
            .extend(delta_seconds)
            .map(|()| serde_json::json!({"accepted": true})),
    };

    match result {
        Ok(body) => (StatusCode::ACCEPTED, Json(body)).into_response(),
        Err(e) => timer_error(e),
    }
}

/// GET /timer
pub(crate) async fn handle_timer_state(State(state): State<Arc<AppState>>) -> Response {
    match state.timer.current_state().await {
        Ok(timer) => (StatusCode::OK, Json(timer)).into_response(),
        Err(e) => timer_error(e),
    }
}

/// GET /timer/events?listener={id}
pub(crate) async fn handle_timer_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let listener = page_listener(query.listener.as_deref());

    // A reload can reconnect before the old connection is noticed as gone.
    if let Err(e) = state.timer.detach(listener.as_str()) {
        return timer_error(e);
    }
    let subscription = match state.timer.subscribe(listener.as_str()) {
        Ok(s) => s,
        Err(e) => return timer_error(e),
    };
    tracing::debug!(%listener, "event stream opened");

    let mut shutdown = state.shutdown.subscribe();
    let stream = event_stream(subscription).take_until(async move {
        let _ = shutdown.wait_for(|closing| *closing).await;
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Host listener id for a page-supplied id, or a fresh anonymous one.
fn page_listener(requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|l| !l.is_empty()) {
        Some(id) => format!("{PAGE_LISTENER_PREFIX}{id}"),
        None => format!(
            "{PAGE_LISTENER_PREFIX}anonymous-{}",
            ANONYMOUS_LISTENERS.fetch_add(1, Ordering::Relaxed)
        ),
    }
}

/// SSE frames named after the event, with the event JSON as data.
fn event_stream(subscription: TimerSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next_event().await?;
        let frame = match Event::default().event(event.name()).json_data(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(listener = %subscription.id(), error = %e, "event not encoded");
                Event::default().comment("encoding error")
            }
        };
        Some((Ok(frame), subscription))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serve::DISPATCH_LISTENER;

    #[test]
    fn commands_parse_by_action() {
        let start: TimerCommand =
            serde_json::from_str(r#"{"action":"start","duration_seconds":90}"#).unwrap();
        assert!(matches!(
            start,
            TimerCommand::Start {
                duration_seconds: 90,
                deep_link: None
            }
        ));

        let stop: TimerCommand = serde_json::from_str(r#"{"action":"stop"}"#).unwrap();
        assert!(matches!(stop, TimerCommand::Stop));

        let extend: TimerCommand =
            serde_json::from_str(r#"{"action":"extend","delta_seconds":-15}"#).unwrap();
        assert!(matches!(extend, TimerCommand::Extend { delta_seconds: -15 }));
    }

    #[test]
    fn page_ids_cannot_name_the_dispatcher() {
        assert_eq!(page_listener(Some(" tab-1 ")), "page:tab-1");
        assert_ne!(page_listener(Some(DISPATCH_LISTENER)), DISPATCH_LISTENER);
        assert!(!DISPATCH_LISTENER.starts_with(PAGE_LISTENER_PREFIX));

        let a = page_listener(None);
        let b = page_listener(Some(""));
        assert!(a.starts_with("page:anonymous-"));
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<TimerCommand>(r#"{"action":"pause"}"#).is_err());
        assert!(serde_json::from_str::<TimerCommand>(r#"{"action":"start"}"#).is_err());
    }
}
