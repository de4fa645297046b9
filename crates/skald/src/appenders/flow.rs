//! Appenders built from stream stages.
//!
//! A [`FlowAppender`] decouples the dispatch worker from a slow or bursty
//! sink: `append` enqueues the event and returns, a dedicated worker drives
//! the event through a [`Stage`] and hands whatever comes out to the
//! [`FlowSink`].

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::appenders::Appender;
use crate::error::{Result, TelemetryError};
use crate::fallback;
use crate::stream::{Batcher, DropNotice, RateDecision, RateLimiter};

/// A pure transformation step between the flow queue and the sink. Offered
/// one item at a time with an explicit clock; returns zero or more outputs.
pub trait Stage<I>: Send + 'static {
    type Out: Send + 'static;

    fn offer(&mut self, item: I, now_millis: u64) -> Vec<Self::Out>;
}

/// Groups items into exact-size batches. A trailing partial batch is held
/// until it fills.
pub struct BatchStage<T> {
    batcher: Batcher<T>,
}

impl<T: Send + 'static> BatchStage<T> {
    pub fn new(size: usize) -> Result<Self> {
        Ok(Self {
            batcher: Batcher::new(size)?,
        })
    }
}

impl<T: Send + 'static> Stage<T> for BatchStage<T> {
    type Out = Vec<T>;

    fn offer(&mut self, item: T, _now_millis: u64) -> Vec<Vec<T>> {
        match self.batcher.push(item) {
            Some(batch) => vec![batch],
            None => Vec::new(),
        }
    }
}

/// Rate-limits items with burst tolerance. Dropped-item notices go to the
/// `on_drop` callback, by default the stderr side channel.
pub struct FloodStage<T> {
    limiter: RateLimiter,
    on_drop: Box<dyn Fn(DropNotice) + Send>,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T: Send + 'static> FloodStage<T> {
    pub fn new(
        requests_per_second: u32,
        burst_duration_millis: u64,
        burst_reset_period_millis: u64,
    ) -> Result<Self> {
        Ok(Self {
            limiter: RateLimiter::new(
                requests_per_second,
                burst_duration_millis,
                burst_reset_period_millis,
            )?,
            on_drop: Box::new(|notice| {
                fallback::flood_notice(notice.dropped, notice.total_dropped)
            }),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn with_drop_handler(mut self, on_drop: impl Fn(DropNotice) + Send + 'static) -> Self {
        self.on_drop = Box::new(on_drop);
        self
    }
}

impl<T: Send + 'static> Stage<T> for FloodStage<T> {
    type Out = T;

    fn offer(&mut self, item: T, now_millis: u64) -> Vec<T> {
        match self.limiter.offer(now_millis) {
            RateDecision::Emit { drop_notice } => {
                if let Some(notice) = drop_notice {
                    (self.on_drop)(notice);
                }
                vec![item]
            }
            RateDecision::Drop => Vec::new(),
        }
    }
}

/// Receives a stage's output on the flow worker.
#[async_trait]
pub trait FlowSink<T>: Send + Sync + 'static {
    async fn handle(&self, item: T) -> Result<()>;
}

/// An appender whose events pass through a stage on a dedicated worker
/// before reaching the sink. Sink failures are reported on the side
/// channel; the dispatch worker never sees them.
pub struct FlowAppender<E> {
    name: String,
    tx: UnboundedSender<E>,
}

impl<E: Clone + Send + Sync + 'static> FlowAppender<E> {
    /// Builds an appender from an arbitrary stage and sink. The worker runs
    /// until the appender is dropped and the queue drains.
    pub fn with_stage<S>(
        name: impl Into<String>,
        mut stage: S,
        sink: impl FlowSink<S::Out>,
    ) -> Self
    where
        S: Stage<E>,
    {
        let name = name.into();
        let worker_name = name.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<E>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let now = Utc::now().timestamp_millis() as u64;
                for out in stage.offer(event, now) {
                    if let Err(err) = sink.handle(out).await {
                        fallback::sink_failure(&worker_name, &err);
                    }
                }
            }
        });
        Self { name, tx }
    }

    /// Batching appender: the sink receives exact-size batches.
    pub fn batching(
        name: impl Into<String>,
        batch_size: usize,
        sink: impl FlowSink<Vec<E>>,
    ) -> Result<Self> {
        Ok(Self::with_stage(name, BatchStage::new(batch_size)?, sink))
    }

    /// Flood-protected appender: over-rate events outside the burst window
    /// are dropped and counted.
    pub fn flood_protected(
        name: impl Into<String>,
        requests_per_second: u32,
        burst_duration_millis: u64,
        burst_reset_period_millis: u64,
        sink: impl FlowSink<E>,
    ) -> Result<Self> {
        Ok(Self::with_stage(
            name,
            FloodStage::new(
                requests_per_second,
                burst_duration_millis,
                burst_reset_period_millis,
            )?,
            sink,
        ))
    }
}

#[async_trait]
impl<E: Clone + Send + Sync + 'static> Appender<E> for FlowAppender<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, event: &E) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| TelemetryError::Append("flow worker stopped".to_string()))
    }
}
