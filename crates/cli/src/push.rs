//! Webhook delivery of "rest finished" notifications to a push relay.

use async_trait::async_trait;
use gymtrack_core::{Notification, Notifier, NotifyError};

/// POSTs `{title, body, url}` as JSON to a push relay endpoint.
pub(crate) struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "title": notification.title,
            "body": notification.body,
            "url": notification.deep_link,
        });
        let agent = self.agent.clone();
        let url = self.url.clone();

        // ureq is synchronous, so wrap in spawn_blocking
        tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .header("Content-Type", "application/json")
                .send_json(&body)
                .map(|_| ())
        })
        .await
        .map_err(|e| NotifyError::Delivery(format!("task join error: {}", e)))?
        .map_err(|e| match e {
            ureq::Error::StatusCode(401 | 403) => NotifyError::PermissionDenied,
            other => NotifyError::Delivery(other.to_string()),
        })?;

        tracing::debug!(url = %self.url, "notification delivered");
        Ok(())
    }
}
