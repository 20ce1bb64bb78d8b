//! Notifier doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::notify::{Notification, Notifier, NotifyError};

#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Counts calls and always fails with the given error.
#[derive(Debug)]
pub(crate) struct FailingNotifier {
    calls: Arc<AtomicUsize>,
    error: NotifyError,
}

impl FailingNotifier {
    pub(crate) fn new(calls: Arc<AtomicUsize>, error: NotifyError) -> Self {
        Self { calls, error }
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}
