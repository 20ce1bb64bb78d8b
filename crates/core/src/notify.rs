//! Notification delivery contract.
//!
//! The timer host fires a notification when a rest period ends. Delivery is
//! a side effect: callers log failures and move on.

use async_trait::async_trait;
use serde::Serialize;

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Where the notification should lead when opened, e.g. `/sessions/12`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// The user has not granted permission to show notifications.
    #[error("notification permission denied")]
    PermissionDenied,

    /// The push relay rejected or never received the notification.
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            deep_link = notification.deep_link.as_deref().unwrap_or("-"),
            "notification"
        );
        Ok(())
    }
}
