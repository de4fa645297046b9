//! Bounded buffering in front of a sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::appenders::Appender;
use crate::appenders::flow::FlowSink;
use crate::error::Result;
use crate::fallback;
use crate::stream::{BoundedBuffer, OverflowPolicy};

struct Shared<E> {
    buffer: Mutex<BoundedBuffer<E>>,
    notify: Notify,
    closed: AtomicBool,
}

/// An appender that absorbs bursts into a capacity-bounded buffer. When the
/// buffer overflows, events are evicted per the overflow policy and the
/// producer never observes an error. A dedicated worker drains the buffer
/// into the sink, finishes the backlog after the appender is dropped, and
/// then exits.
pub struct BufferedAppender<E> {
    name: String,
    shared: Arc<Shared<E>>,
}

impl<E: Clone + Send + Sync + 'static> BufferedAppender<E> {
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        policy: OverflowPolicy,
        sink: impl FlowSink<E>,
    ) -> Result<Self> {
        let name = name.into();
        let shared = Arc::new(Shared {
            buffer: Mutex::new(BoundedBuffer::new(capacity, policy)?),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let worker = shared.clone();
        let worker_name = name.clone();
        tokio::spawn(async move {
            loop {
                let next = worker.buffer.lock().unwrap().pop();
                match next {
                    Some(event) => {
                        if let Err(err) = sink.handle(event).await {
                            fallback::sink_failure(&worker_name, &err);
                        }
                    }
                    None => {
                        if worker.closed.load(Ordering::Acquire) {
                            return;
                        }
                        // Register the waiter before re-checking, so a push
                        // or close between the check and the await is not
                        // missed.
                        let notified = worker.notify.notified();
                        if worker.buffer.lock().unwrap().is_empty()
                            && !worker.closed.load(Ordering::Acquire)
                        {
                            notified.await;
                        }
                    }
                }
            }
        });

        Ok(Self { name, shared })
    }

    /// Number of events currently waiting in the buffer.
    pub fn backlog(&self) -> usize {
        self.shared.buffer.lock().unwrap().len()
    }
}

impl<E> Drop for BufferedAppender<E> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

#[async_trait]
impl<E: Clone + Send + Sync + 'static> Appender<E> for BufferedAppender<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, event: &E) -> Result<()> {
        // Overflow eviction is deliberate load shedding, not a failure.
        self.shared.buffer.lock().unwrap().push(event.clone());
        self.shared.notify.notify_one();
        Ok(())
    }
}
