//! `gymtrack serve` -- HTTP JSON API for workout sessions and the rest timer.
//!
//! One process owns one background rest timer. Any number of pages attach to
//! it through the event stream and drive sessions through the JSON routes.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication (config `api_key` or GYMTRACK_API_KEY)
//!
//! Endpoints:
//! - GET  /health                         - Server status (exempt from auth)
//! - GET  /routines                       - Routines seeded from config
//! - GET  /routines/{id}/exercises        - Exercises of a routine, in order
//! - POST /sessions                       - Start a session for a routine
//! - GET  /sessions/{id}                  - Session state, progress and log
//! - POST /sessions/{id}/series           - Record the awaited series
//! - POST /sessions/{id}/advance          - Rest, next exercise, or close
//! - POST /sessions/{id}/rest/extend      - Lengthen the current rest
//! - POST /sessions/{id}/rest/skip        - End the current rest now
//! - POST /sessions/{id}/note             - Set the general note
//! - POST /sessions/{id}/finalize         - Close the session early
//! - POST /timer                          - start / stop / extend the timer
//! - GET  /timer                          - Current timer state
//! - GET  /timer/events?listener={id}     - Server-sent tick/finished events
//!
//! All responses except the event stream use Content-Type: application/json.

mod handlers;
mod middleware;
mod sessions;
mod state;
mod timer;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use gymtrack_core::{LogNotifier, Notifier, SessionConfig, TimerError, TimerHost};
use gymtrack_storage::MemoryStorage;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_health, handle_list_routines, handle_not_found, handle_routine_exercises,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::sessions::{
    handle_advance, handle_create_session, handle_extend_rest, handle_finalize,
    handle_get_session, handle_record_series, handle_set_note, handle_skip_rest,
};
use self::state::{AppState, RateLimiter};
use self::timer::{handle_timer_command, handle_timer_events, handle_timer_state};
use crate::config::ServerConfig;
use crate::push::WebhookNotifier;

/// Maximum request body size: 64 KB.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Listener id under which the server itself follows the timer. Page
/// listeners are always prefixed, so no client can take this id.
const DISPATCH_LISTENER: &str = "server:sessions";

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the shared state: store seeded from config, timer host, notifier.
fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => {
            tracing::info!(%url, "push notifications via webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };
    let timer = TimerHost::spawn(config.notifications.host_config(), notifier);

    Arc::new(AppState {
        storage: Arc::new(MemoryStorage::with_routines(config.routines.clone())),
        timer,
        sessions: tokio::sync::RwLock::new(HashMap::new()),
        session_config: SessionConfig {
            default_rest_seconds: config.default_rest_seconds,
        },
        rate_limiter: RateLimiter::new(config.rate_limit),
        api_key: config.api_key.clone(),
        shutdown: tokio::sync::watch::Sender::new(false),
    })
}

/// Follow the timer and hand every event to the live sessions, so a rest
/// ends on its own when the countdown finishes.
fn spawn_dispatcher(state: Arc<AppState>) -> Result<(), TimerError> {
    let mut events = state.timer.subscribe(DISPATCH_LISTENER)?;
    tokio::spawn(async move {
        while let Some(event) = events.next_event().await {
            for session in state.all_sessions().await {
                let mut session = session.lock().await;
                if session.handle_timer_event(&event) {
                    tracing::debug!(session_id = session.id(), run_id = %event.run_id(), "rest over");
                }
            }
        }
        tracing::debug!("session dispatcher stopped");
    });
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    // CORS: permissive for local dev
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/routines", get(handle_list_routines))
        .route("/routines/{id}/exercises", get(handle_routine_exercises))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", get(handle_get_session))
        .route("/sessions/{id}/series", post(handle_record_series))
        .route("/sessions/{id}/advance", post(handle_advance))
        .route("/sessions/{id}/rest/extend", post(handle_extend_rest))
        .route("/sessions/{id}/rest/skip", post(handle_skip_rest))
        .route("/sessions/{id}/note", post(handle_set_note))
        .route("/sessions/{id}/finalize", post(handle_finalize))
        .route("/timer", get(handle_timer_state).post(handle_timer_command))
        .route("/timer/events", get(handle_timer_events))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// Security:
/// - CORS: Permissive (`Any` origin) for local dev; tighten for production.
/// - Rate limit: Per-IP, `rate_limit` requests per minute.
/// - API key: If configured, all endpoints except /health require auth.
pub async fn start_server(
    port: u16,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config);
    spawn_dispatcher(state.clone())?;

    if state.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(
        routines = config.routines.len(),
        rate_limit = config.rate_limit,
        default_rest_seconds = config.default_rest_seconds,
        "configuration loaded"
    );

    let app = router(state.clone());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("gymtrack listening on http://0.0.0.0:{}", port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state))
    .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C), then end open event streams so the
/// server can drain.
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
    state.shutdown.send_replace(true);
}
