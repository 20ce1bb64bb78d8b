//! Server configuration for `gymtrack serve`.
//!
//! Every field is optional; a missing file section falls back to defaults.
//!
//! # Example
//!
//! ```toml
//! port = 8080
//! default_rest_seconds = 60
//! rate_limit = 120
//! api_key = "change-me"
//!
//! [notifications]
//! webhook_url = "http://localhost:4000/notify"
//! title = "Rest finished!"
//! body = "Time to start your next series."
//!
//! [[routines]]
//! id = 1
//! name = "Push day"
//!
//! [[routines.exercises]]
//! exercise_id = 10
//! name = "Bench press"
//! target_series = 3
//! target_reps = 8
//! suggested_weight = 60.0
//! rest_seconds = 90
//! ```
//!
//! Environment variables take precedence over the file:
//! `GYMTRACK_API_KEY`, `GYMTRACK_RATE_LIMIT`, `GYMTRACK_PUSH_URL`.

use std::path::Path;

use gymtrack_core::HostConfig;
use gymtrack_storage::RoutineRecord;
use serde::Deserialize;

pub(crate) const DEFAULT_PORT: u16 = 8080;

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

pub(crate) const DEFAULT_REST_SECONDS: u32 = 60;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    /// Port used when `--port` is not given.
    pub(crate) port: Option<u16>,
    /// Rest applied to exercises without a configured rest time.
    pub(crate) default_rest_seconds: u32,
    /// Requests per minute per client IP.
    pub(crate) rate_limit: u64,
    /// None disables authentication.
    pub(crate) api_key: Option<String>,
    pub(crate) notifications: NotificationConfig,
    /// Routines seeded into the in-memory store.
    pub(crate) routines: Vec<RoutineRecord>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            default_rest_seconds: DEFAULT_REST_SECONDS,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
            notifications: NotificationConfig::default(),
            routines: Vec::new(),
        }
    }
}

/// `[notifications]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct NotificationConfig {
    /// Push relay endpoint. Without one, notifications are only logged.
    pub(crate) webhook_url: Option<String>,
    pub(crate) title: String,
    pub(crate) body: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let host = HostConfig::default();
        Self {
            webhook_url: None,
            title: host.finished_title,
            body: host.finished_body,
        }
    }
}

impl NotificationConfig {
    pub(crate) fn host_config(&self) -> HostConfig {
        HostConfig {
            finished_title: self.title.clone(),
            finished_body: self.body.clone(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Load the config file (if any), then apply environment overrides.
    ///
    /// Returns a human-readable error string on failure.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(path) => read_config(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `GYMTRACK_*` overrides. Empty or unparsable values are ignored.
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("GYMTRACK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(limit) = lookup("GYMTRACK_RATE_LIMIT").and_then(|v| v.parse().ok()) {
            self.rate_limit = limit;
        }
        if let Some(url) = lookup("GYMTRACK_PUSH_URL") {
            self.notifications.webhook_url = Some(url);
        }
        if self.api_key.as_deref().is_some_and(str::is_empty) {
            self.api_key = None;
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if self.default_rest_seconds == 0 {
            errors.push("default_rest_seconds must be greater than zero".to_string());
        }
        if self.rate_limit == 0 {
            errors.push("rate_limit must be greater than zero".to_string());
        }
        let mut seen = std::collections::BTreeSet::new();
        for routine in &self.routines {
            if !seen.insert(routine.id) {
                errors.push(format!("routine id {} is defined more than once", routine.id));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    pub(crate) fn port(&self, cli_port: Option<u16>) -> u16 {
        cli_port.or(self.port).unwrap_or(DEFAULT_PORT)
    }
}

fn read_config(path: &Path) -> Result<ServerConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SAMPLE: &str = r#"
port = 9000
default_rest_seconds = 75
api_key = "from-file"

[notifications]
webhook_url = "http://relay.local/notify"
title = "Go!"

[[routines]]
id = 1
name = "Push day"

[[routines.exercises]]
exercise_id = 10
name = "Bench press"
target_series = 3
target_reps = 8
suggested_weight = 60.0
rest_seconds = 90

[[routines.exercises]]
exercise_id = 11
target_series = 2
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parses_full_file() {
        let config: ServerConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.port, Some(9000));
        assert_eq!(config.default_rest_seconds, 75);
        assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.notifications.title, "Go!");
        assert_eq!(config.notifications.body, HostConfig::default().finished_body);

        let routine = &config.routines[0];
        assert_eq!(routine.exercises.len(), 2);
        assert_eq!(routine.exercises[0].rest_seconds, Some(90));
        assert_eq!(routine.exercises[1].suggested_weight, None);
        assert_eq!(routine.exercises[1].rest_seconds, None);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.port(None), DEFAULT_PORT);
        assert_eq!(config.default_rest_seconds, DEFAULT_REST_SECONDS);
        assert!(config.api_key.is_none());
        assert!(config.routines.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<ServerConfig>("prot = 80").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config: ServerConfig = toml::from_str(SAMPLE).unwrap();
        config.apply_env(env(&[
            ("GYMTRACK_API_KEY", "from-env"),
            ("GYMTRACK_RATE_LIMIT", "5"),
            ("GYMTRACK_PUSH_URL", "http://other/notify"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.rate_limit, 5);
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("http://other/notify")
        );
    }

    #[test]
    fn blank_or_bad_env_values_are_ignored() {
        let mut config: ServerConfig = toml::from_str(SAMPLE).unwrap();
        config.apply_env(env(&[
            ("GYMTRACK_API_KEY", "  "),
            ("GYMTRACK_RATE_LIMIT", "lots"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn cli_port_wins() {
        let config: ServerConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.port(Some(1234)), 1234);
        assert_eq!(config.port(None), 9000);
    }

    #[test]
    fn validation_collects_every_problem() {
        let config: ServerConfig = toml::from_str(
            r#"
default_rest_seconds = 0

[[routines]]
id = 1
name = "a"

[[routines]]
id = 1
name = "b"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("default_rest_seconds"), "{err}");
        assert!(err.contains("routine id 1"), "{err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ServerConfig::load(Some(Path::new("/nonexistent/gymtrack.toml"))).unwrap_err();
        assert!(err.contains("could not read"), "{err}");
    }
}
