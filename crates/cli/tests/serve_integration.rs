//! Integration tests for the `gymtrack serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so parallel `cargo test --workspace` runs
/// (which spawn separate test binaries) don't collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Routine 1 rests one second between series so a rest can run out during
/// a test; routine 2 rests a full minute.
const CONFIG: &str = r#"
default_rest_seconds = 60

[[routines]]
id = 1
name = "Quick squats"

[[routines.exercises]]
exercise_id = 100
name = "Squat"
target_series = 2
target_reps = 10
suggested_weight = 40.0
rest_seconds = 1

[[routines]]
id = 2
name = "Push day"

[[routines.exercises]]
exercise_id = 200
name = "Bench press"
target_series = 3
target_reps = 8
suggested_weight = 60.0

[[routines.exercises]]
exercise_id = 201
name = "Dips"
target_series = 2
"#;

/// A running server plus the directory holding its config file.
struct Server {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

/// Helper: start `gymtrack serve` with the test config and extra env vars.
fn start_server(env: &[(&str, &str)]) -> Server {
    let port = next_port();
    let dir = TempDir::new().expect("temp dir");
    let config_path: PathBuf = dir.path().join("gymtrack.toml");
    std::fs::write(&config_path, CONFIG).expect("write config");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gymtrack"));
    cmd.arg("serve")
        .arg("--port")
        .arg(port.to_string())
        .arg("--config")
        .arg(&config_path);
    for var in ["GYMTRACK_API_KEY", "GYMTRACK_RATE_LIMIT", "GYMTRACK_PUSH_URL"] {
        cmd.env_remove(var);
    }
    for (name, value) in env {
        cmd.env(name, value);
    }
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start gymtrack serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server {
        child,
        port,
        _dir: dir,
    }
}

/// Helper: make a simple HTTP GET request and return (status, body).
fn http_get(port: u16, path: &str) -> (u16, String) {
    let (status, _, body) = http_get_with_headers(port, path, &[]);
    (status, body)
}

/// Helper: make a simple HTTP POST request and return (status, body).
fn http_post(port: u16, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let request = format!(
        "POST {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path, port, body.len(), body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

/// Helper: make an HTTP GET request with custom headers and return (status, response_headers, body).
fn http_get_with_headers(
    port: u16,
    path: &str,
    extra_headers: &[(&str, &str)],
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Connection: close\r\n\r\n",
        path, port, header_lines
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response_full(&response)
}

/// Helper: open an event stream and read until `needle` shows up or five
/// seconds pass. Returns everything read.
fn read_stream_until(port: u16, path: &str, needle: &str) -> String {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost:{}\r\nAccept: text/event-stream\r\n\r\n",
        path, port
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    while Instant::now() < deadline {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                received.extend_from_slice(&chunk[..n]);
                if String::from_utf8_lossy(&received).contains(needle) {
                    break;
                }
            }
            Err(_) => continue,
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let (status, _, body) = parse_http_response_full(response);
    (status, body)
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response_full(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers.contains("transfer-encoding: chunked")
        || headers.contains("Transfer-Encoding: chunked")
    {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            // Partial chunk, take what we have
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        // Skip past chunk data + \r\n
        remaining = if chunk_end + 2 <= remaining.len() {
            &remaining[chunk_end + 2..]
        } else {
            ""
        };
    }

    result
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON ({e}): {body}"))
}

/// Helper: create a session and return its id.
fn create_session(port: u16, routine_id: i64) -> i64 {
    let (status, body) = http_post(
        port,
        "/sessions",
        &format!(r#"{{"routine_id":{}}}"#, routine_id),
    );
    assert_eq!(status, 201, "{body}");
    json(&body)["session_id"].as_i64().expect("session_id")
}

/// Poll a session until it reaches `state`.
fn wait_for_state(port: u16, id: i64, state: &str) -> serde_json::Value {
    for _ in 0..50 {
        let (_, body) = http_get(port, &format!("/sessions/{}", id));
        let view = json(&body);
        if view["state"] == state {
            return view;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    panic!("session {} never reached {}", id, state);
}

// ──────────────────────────────────────────────
// 1. Basics
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/health");

    assert_eq!(status, 200);
    let json = json(&body);
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some(), "version field must be present");
    assert_eq!(json["active_sessions"], 0);
}

#[test]
fn not_found_returns_404() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/nope");
    assert_eq!(status, 404);
    assert_eq!(json(&body)["error"], "not found");
}

#[test]
fn routines_listed_with_exercise_counts() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/routines");
    assert_eq!(status, 200);
    let routines = json(&body)["routines"].as_array().cloned().unwrap();
    assert_eq!(routines.len(), 2);
    assert_eq!(routines[0]["name"], "Quick squats");
    assert_eq!(routines[1]["exercise_count"], 2);
}

#[test]
fn routine_exercises_listed_in_order() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/routines/2/exercises");
    assert_eq!(status, 200);
    let exercises = json(&body)["exercises"].as_array().cloned().unwrap();
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0]["name"], "Bench press");
    assert_eq!(exercises[1]["exercise_id"], 201);

    let (status, _) = http_get(server.port, "/routines/99/exercises");
    assert_eq!(status, 404);
}

// ──────────────────────────────────────────────
// 2. Sessions
// ──────────────────────────────────────────────

#[test]
fn session_runs_to_completion_with_timed_rest() {
    let server = start_server(&[]);
    let port = server.port;
    let id = create_session(port, 1);

    let (status, body) = http_get(port, &format!("/sessions/{}", id));
    assert_eq!(status, 200);
    let view = json(&body);
    assert_eq!(view["state"], "awaiting_series_input");
    assert_eq!(view["defaults"]["weight"], 40.0);

    let (status, body) = http_post(
        port,
        &format!("/sessions/{}/series", id),
        r#"{"reps":10,"weight":42.5}"#,
    );
    assert_eq!(status, 200, "{body}");
    assert_eq!(json(&body)["state"], "series_recorded");

    let (status, body) = http_post(port, &format!("/sessions/{}/advance", id), "");
    assert_eq!(status, 200, "{body}");
    assert_eq!(json(&body)["state"], "resting");

    // The one-second rest runs out on its own.
    let view = wait_for_state(port, id, "awaiting_series_input");
    assert_eq!(view["series_index"], 2);
    assert_eq!(view["defaults"]["weight"], 42.5);

    let (status, _) = http_post(
        port,
        &format!("/sessions/{}/series", id),
        r#"{"reps":8,"weight":42.5}"#,
    );
    assert_eq!(status, 200);
    let (status, body) = http_post(port, &format!("/sessions/{}/advance", id), "");
    assert_eq!(status, 200);
    let view = json(&body);
    assert_eq!(view["state"], "session_complete");
    assert!(view["finished_at"].is_string());
    assert_eq!(view["completed_series"].as_array().unwrap().len(), 2);
    assert_eq!(view["progress"]["overall_percent"], 100.0);
}

#[test]
fn zero_reps_returns_400_and_changes_nothing() {
    let server = start_server(&[]);
    let id = create_session(server.port, 1);

    let (status, body) = http_post(
        server.port,
        &format!("/sessions/{}/series", id),
        r#"{"reps":0}"#,
    );
    assert_eq!(status, 400);
    assert!(json(&body)["error"].as_str().unwrap().contains("reps"));

    let (_, body) = http_get(server.port, &format!("/sessions/{}", id));
    let view = json(&body);
    assert_eq!(view["state"], "awaiting_series_input");
    assert_eq!(view["completed_series"].as_array().unwrap().len(), 0);
}

#[test]
fn out_of_order_call_returns_409() {
    let server = start_server(&[]);
    let id = create_session(server.port, 2);
    let (status, body) = http_post(server.port, &format!("/sessions/{}/advance", id), "");
    assert_eq!(status, 409);
    assert!(json(&body)["error"].as_str().unwrap().contains("advance"));
}

#[test]
fn unknown_routine_or_session_returns_404() {
    let server = start_server(&[]);
    let (status, _) = http_post(server.port, "/sessions", r#"{"routine_id":42}"#);
    assert_eq!(status, 404);
    let (status, _) = http_get(server.port, "/sessions/42");
    assert_eq!(status, 404);
    let (status, _) = http_post(server.port, "/sessions/42/advance", "");
    assert_eq!(status, 404);
}

#[test]
fn malformed_body_returns_400() {
    let server = start_server(&[]);
    let (status, body) = http_post(server.port, "/sessions", r#"{"routine":"x"}"#);
    assert_eq!(status, 400);
    assert!(json(&body).get("error").is_some());
}

#[test]
fn skip_and_extend_rest() {
    let server = start_server(&[]);
    let port = server.port;
    let id = create_session(port, 2);

    http_post(port, &format!("/sessions/{}/series", id), r#"{"reps":8}"#);
    let (_, body) = http_post(port, &format!("/sessions/{}/advance", id), "");
    let view = json(&body);
    assert_eq!(view["state"], "resting");
    assert_eq!(view["rest_seconds"], 60);

    let (status, body) = http_post(
        port,
        &format!("/sessions/{}/rest/extend", id),
        r#"{"delta_seconds":30}"#,
    );
    assert_eq!(status, 200, "{body}");
    assert_eq!(json(&body)["rest_remaining_seconds"], 90);

    let (status, body) = http_post(port, &format!("/sessions/{}/rest/skip", id), "");
    assert_eq!(status, 200, "{body}");
    let view = json(&body);
    assert_eq!(view["state"], "awaiting_series_input");
    assert_eq!(view["series_index"], 2);

    let (_, body) = http_get(port, "/timer");
    assert_eq!(json(&body)["running"], false);
}

#[test]
fn early_finalize_with_note() {
    let server = start_server(&[]);
    let port = server.port;
    let id = create_session(port, 2);
    http_post(port, &format!("/sessions/{}/series", id), r#"{"reps":8}"#);

    let (status, _) = http_post(
        port,
        &format!("/sessions/{}/note", id),
        r#"{"note":"shoulder felt off"}"#,
    );
    assert_eq!(status, 200);

    let (status, body) = http_post(port, &format!("/sessions/{}/finalize", id), "");
    assert_eq!(status, 200, "{body}");
    let view = json(&body);
    assert_eq!(view["state"], "session_complete");
    assert_eq!(view["general_note"], "shoulder felt off");
    assert_eq!(view["completed_series"].as_array().unwrap().len(), 1);

    // Finalizing twice is harmless.
    let (status, body) = http_post(
        port,
        &format!("/sessions/{}/finalize", id),
        r#"{"note":"again"}"#,
    );
    assert_eq!(status, 200);
    assert_eq!(json(&body)["general_note"], "shoulder felt off");
}

#[test]
fn completed_session_leaves_live_set_but_stays_readable() {
    let server = start_server(&[]);
    let port = server.port;
    let finished = create_session(port, 2);
    let open = create_session(port, 2);

    let (_, body) = http_get(port, "/health");
    assert_eq!(json(&body)["active_sessions"], 2);

    http_post(port, &format!("/sessions/{}/series", finished), r#"{"reps":8}"#);
    let (status, _) = http_post(port, &format!("/sessions/{}/finalize", finished), "");
    assert_eq!(status, 200);

    let (_, body) = http_get(port, "/health");
    assert_eq!(json(&body)["active_sessions"], 1);

    let (status, body) = http_get(port, &format!("/sessions/{}", finished));
    assert_eq!(status, 200, "{body}");
    let view = json(&body);
    assert_eq!(view["state"], "session_complete");
    assert!(view["finished_at"].is_string());
    assert_eq!(view["completed_series"].as_array().unwrap().len(), 1);

    let (status, _) = http_post(
        port,
        &format!("/sessions/{}/series", finished),
        r#"{"reps":8}"#,
    );
    assert_eq!(status, 409);

    let (status, body) = http_get(port, &format!("/sessions/{}", open));
    assert_eq!(status, 200);
    assert_eq!(json(&body)["state"], "awaiting_series_input");
}

#[test]
fn rest_ends_on_its_own_while_pages_come_and_go() {
    let server = start_server(&[]);
    let port = server.port;
    let id = create_session(port, 2);
    http_post(port, &format!("/sessions/{}/series", id), r#"{"reps":8}"#);
    let (_, body) = http_post(port, &format!("/sessions/{}/advance", id), "");
    assert_eq!(json(&body)["state"], "resting");

    // Streams open and close, one id is reused, and some ids look like
    // the server's own listener.
    for listener in [
        "tab-1",
        "tab-1",
        "gymtrack-sessions",
        "server:sessions",
        "server%3Asessions",
    ] {
        let received = read_stream_until(
            port,
            &format!("/timer/events?listener={}", listener),
            "event: tick",
        );
        assert!(received.contains("event: tick"), "{listener}: {received}");
    }
    let received = read_stream_until(port, "/timer/events", "event: tick");
    assert!(received.contains("event: tick"), "{received}");

    // Cut the minute of rest down to a second and let the timer finish it.
    let (status, _) = http_post(
        port,
        &format!("/sessions/{}/rest/extend", id),
        r#"{"delta_seconds":-59}"#,
    );
    assert_eq!(status, 200);
    let view = wait_for_state(port, id, "awaiting_series_input");
    assert_eq!(view["series_index"], 2);
}

// ──────────────────────────────────────────────
// 3. Timer
// ──────────────────────────────────────────────

#[test]
fn timer_start_state_stop() {
    let server = start_server(&[]);
    let port = server.port;

    let (status, body) = http_post(
        port,
        "/timer",
        r#"{"action":"start","duration_seconds":30}"#,
    );
    assert_eq!(status, 202, "{body}");
    assert!(json(&body)["run_id"].is_u64());

    let (status, body) = http_get(port, "/timer");
    assert_eq!(status, 200);
    let timer = json(&body);
    assert_eq!(timer["running"], true);
    assert_eq!(timer["duration_seconds"], 30);

    let (status, _) = http_post(port, "/timer", r#"{"action":"stop"}"#);
    assert_eq!(status, 202);
    let (_, body) = http_get(port, "/timer");
    assert_eq!(json(&body)["running"], false);
}

#[test]
fn timer_rejects_bad_commands() {
    let server = start_server(&[]);
    let (status, _) = http_post(
        server.port,
        "/timer",
        r#"{"action":"start","duration_seconds":0}"#,
    );
    assert_eq!(status, 400);
    let (status, _) = http_post(server.port, "/timer", r#"{"action":"pause"}"#);
    assert_eq!(status, 400);
}

#[test]
fn event_stream_sends_current_remaining_on_connect() {
    let server = start_server(&[]);
    http_post(
        server.port,
        "/timer",
        r#"{"action":"start","duration_seconds":30}"#,
    );

    let received = read_stream_until(
        server.port,
        "/timer/events?listener=tab-1",
        "remaining_seconds",
    );
    assert!(received.contains("text/event-stream"), "{received}");
    assert!(received.contains("event: tick"), "{received}");
    assert!(received.contains(r#""event":"tick""#), "{received}");
}

#[test]
fn event_stream_reports_finished() {
    let server = start_server(&[]);
    http_post(
        server.port,
        "/timer",
        r#"{"action":"start","duration_seconds":1}"#,
    );
    let received = read_stream_until(server.port, "/timer/events", "event: finished");
    assert!(received.contains("event: finished"), "{received}");
}

// ──────────────────────────────────────────────
// 4. Auth and rate limiting
// ──────────────────────────────────────────────

#[test]
fn api_key_required_except_health() {
    let server = start_server(&[("GYMTRACK_API_KEY", "s3cret")]);
    let port = server.port;

    let (status, _) = http_get(port, "/health");
    assert_eq!(status, 200);

    let (status, _, _) = http_get_with_headers(port, "/timer", &[]);
    assert_eq!(status, 401);

    let (status, _, _) = http_get_with_headers(port, "/timer", &[("Authorization", "Bearer nope")]);
    assert_eq!(status, 403);

    let (status, _, _) =
        http_get_with_headers(port, "/timer", &[("Authorization", "Bearer s3cret")]);
    assert_eq!(status, 200);

    let (status, _, _) = http_get_with_headers(port, "/timer", &[("X-API-Key", "s3cret")]);
    assert_eq!(status, 200);
}

#[test]
fn rate_limit_returns_429() {
    let server = start_server(&[("GYMTRACK_RATE_LIMIT", "2")]);
    let port = server.port;

    assert_eq!(http_get(port, "/health").0, 200);
    assert_eq!(http_get(port, "/health").0, 200);
    let (status, body) = http_get(port, "/health");
    assert_eq!(status, 429);
    assert!(json(&body).get("retry_after").is_some());
}
