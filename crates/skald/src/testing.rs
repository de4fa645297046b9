//! Test doubles for exercising the pipeline.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::appenders::Appender;
use crate::error::{Result, TelemetryError};

/// Captures every appended event for later assertions.
pub struct RecordingAppender<E> {
    name: String,
    events: Mutex<Vec<E>>,
    notify: Notify,
}

impl<E: Clone + Send + Sync> RecordingAppender<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Snapshot of the captured events, in arrival order.
    pub fn events(&self) -> Vec<E> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until at least `count` events arrived; `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl<E: Clone + Send + Sync> Appender<E> for RecordingAppender<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, event: &E) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Fails every append. Used to prove appender failures are isolated.
pub struct FailingAppender {
    name: String,
}

impl FailingAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<E: Send + Sync> Appender<E> for FailingAppender {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, _event: &E) -> Result<()> {
        Err(TelemetryError::Append(format!(
            "'{}' always fails",
            self.name
        )))
    }
}
