//! Debounced task scheduling.
//!
//! A task fires only after the field has been idle for the configured gap.
//! Scheduling again cancels the pending task.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Debouncer for one input field.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    /// Create a debouncer with the given idle gap.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Run `task` after the idle gap unless rescheduled or cancelled first.
    ///
    /// The handle resolves to `true` if the task ran.
    pub fn schedule<F>(&self, task: F) -> JoinHandle<bool>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.replace(Some(token.clone())) {
            previous.cancel();
        }

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("Debounced task superseded");
                    false
                }
                _ = tokio::time::sleep(delay) => {
                    task.await;
                    true
                }
            }
        })
    }

    /// Cancel the pending task, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.replace(None) {
            previous.cancel();
        }
    }

    fn replace(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, token)
    }
}
