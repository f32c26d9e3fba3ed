//! Outcome reporter.
//!
//! Turns reconciliation outcomes into operator-facing messages. Only one
//! notification is visible at a time: a newer one replaces the current one
//! immediately, and each auto-dismisses after its duration.
//!
//! Every notification is also fanned out on a broadcast channel so host
//! adapters can push them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operation confirmed
    Success,
    /// Confirmed with a difference worth a look
    Warning,
    /// Operation failed
    Error,
    /// Informational
    Info,
}

/// A message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic id
    pub id: u64,
    /// Text
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Visible duration in milliseconds
    pub duration_ms: u64,
    /// When it was raised
    pub created_at: DateTime<Utc>,
}

struct NotifierInner {
    current: Mutex<Option<Notification>>,
    dismiss_timer: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    default_duration: Duration,
    sender: broadcast::Sender<Notification>,
}

impl NotifierInner {
    fn current(&self) -> MutexGuard<'_, Option<Notification>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_if(&self, id: u64) {
        let mut current = self.current();
        if current.as_ref().map(|n| n.id) == Some(id) {
            *current = None;
        }
    }
}

/// Reports outcomes to the operator. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    /// Create a notifier with the given default visible duration.
    pub fn new(default_duration: Duration) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(NotifierInner {
                current: Mutex::new(None),
                dismiss_timer: Mutex::new(None),
                next_id: AtomicU64::new(1),
                default_duration,
                sender,
            }),
        }
    }

    /// Show a message for the default duration.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> Notification {
        self.notify_for(message, severity, self.inner.default_duration)
    }

    /// Show a message for `duration`, replacing the current one.
    pub fn notify_for(
        &self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> Notification {
        let notification = Notification {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            message: message.into(),
            severity,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            created_at: Utc::now(),
        };
        debug!(
            id = notification.id,
            severity = ?notification.severity,
            message = %notification.message,
            "Notification"
        );

        *self.inner.current() = Some(notification.clone());
        self.schedule_dismissal(notification.id, duration);

        // No subscribers is fine
        let _ = self.inner.sender.send(notification.clone());
        notification
    }

    fn schedule_dismissal(&self, id: u64, duration: Duration) {
        let mut timer = self
            .inner
            .dismiss_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        // Without a runtime the message stays until replaced or dismissed
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        *timer = Some(handle.spawn(async move {
            tokio::time::sleep(duration).await;
            inner.clear_if(id);
        }));
    }

    /// Currently visible notification.
    pub fn current(&self) -> Option<Notification> {
        self.inner.current().clone()
    }

    /// Clear the current notification.
    pub fn dismiss(&self) {
        *self.inner.current() = None;
    }

    /// Receive every notification raised after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(2500))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss() {
        let notifier = Notifier::new(Duration::from_millis(2500));
        notifier.notify("Refreshed!", Severity::Info);
        assert_eq!(notifier.current().unwrap().message, "Refreshed!");

        tokio::time::sleep(Duration::from_millis(2400)).await;
        assert!(notifier.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(notifier.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_notification_replaces_and_survives_old_timer() {
        let notifier = Notifier::new(Duration::from_millis(2500));
        let first = notifier.notify("first", Severity::Success);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let second = notifier.notify("second", Severity::Warning);
        assert!(second.id > first.id);
        assert_eq!(notifier.current().unwrap().id, second.id);

        // Past the first deadline, the second message remains
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(notifier.current().unwrap().message, "second");

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(notifier.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_duration_and_dismiss() {
        let notifier = Notifier::default();
        let note = notifier.notify_for("long", Severity::Error, Duration::from_secs(10));
        assert_eq!(note.duration_ms, 10_000);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(notifier.current().is_some());

        notifier.dismiss();
        assert!(notifier.current().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_receive_every_notification() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.notify("one", Severity::Info);
        notifier.notify("two", Severity::Error);

        assert_eq!(rx.recv().await.unwrap().message, "one");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.message, "two");
        assert_eq!(second.severity, Severity::Error);
    }

    #[test]
    fn test_without_runtime_keeps_message() {
        let notifier = Notifier::default();
        notifier.notify("offline", Severity::Info);
        assert_eq!(notifier.current().unwrap().message, "offline");
    }
}
