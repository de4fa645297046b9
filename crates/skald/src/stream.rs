//! Composable stream-processing stages for appenders.
//!
//! All three stages are stateful single-consumer machines: they are meant to
//! be owned by one appender's consumption path (the per-domain workers are
//! already single-threaded) and are not internally synchronized. Clocks are
//! passed in explicitly so behavior is deterministic under test.

use std::collections::VecDeque;

use crate::error::{Result, TelemetryError};

/// Fixed-size chunking: accumulates items in arrival order and emits a
/// batch of exactly `size` items once full. A trailing partial batch is
/// held indefinitely, never flushed early.
#[derive(Debug)]
pub struct Batcher<T> {
    size: usize,
    buf: Vec<T>,
}

impl<T> Batcher<T> {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(TelemetryError::Config(
                "batch size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            size,
            buf: Vec::with_capacity(size),
        })
    }

    /// Accepts an item; returns a full batch when the accumulator fills.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buf.push(item);
        if self.buf.len() == self.size {
            let batch = std::mem::replace(&mut self.buf, Vec::with_capacity(self.size));
            Some(batch)
        } else {
            None
        }
    }

    /// Number of items waiting in the current partial batch.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// What to evict when a [`BoundedBuffer`] is pushed past capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered item to make room (default).
    #[default]
    DropOldest,
    /// Reject the incoming item.
    DropNewest,
}

/// Capacity-bounded FIFO buffer. Overflow evicts per policy; the producer
/// never observes an error.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    policy: OverflowPolicy,
    items: VecDeque<T>,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(TelemetryError::Config(
                "buffer capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            policy,
            items: VecDeque::with_capacity(capacity),
        })
    }

    /// Accepts an item, returning whichever item the overflow policy
    /// evicted, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return None;
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = self.items.pop_front();
                self.items.push_back(item);
                evicted
            }
            OverflowPolicy::DropNewest => Some(item),
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Flood protection with burst tolerance.
///
/// Emissions are spaced at least `1000 / requests_per_second` milliseconds
/// apart. The first over-rate arrival opens a burst window during which
/// rate limiting is suspended; the window expires `burst_reset_period_millis`
/// after it opened, checked on the next on-time emission. Items arriving
/// over-rate outside the burst window are dropped and counted; at most one
/// [`DropNotice`] is surfaced per transition back into the allowed rate.
#[derive(Debug)]
pub struct RateLimiter {
    window_millis: u64,
    burst_duration_millis: u64,
    burst_reset_period_millis: u64,
    last_emission: u64,
    /// 0 = no burst window open.
    burst_start: u64,
    drop_count: u64,
    total_dropped: u64,
}

/// Outcome of offering one item to the [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Pass the item through; `drop_notice` flushes drops accumulated since
    /// the previous successful emission.
    Emit { drop_notice: Option<DropNotice> },
    /// Discard the item.
    Drop,
}

/// Count of items dropped since the previous notice, plus the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropNotice {
    pub dropped: u64,
    pub total_dropped: u64,
}

impl RateLimiter {
    pub fn new(
        requests_per_second: u32,
        burst_duration_millis: u64,
        burst_reset_period_millis: u64,
    ) -> Result<Self> {
        if requests_per_second == 0 {
            return Err(TelemetryError::Config(
                "requests per second must be greater than 0".to_string(),
            ));
        }
        if burst_duration_millis == 0 {
            return Err(TelemetryError::Config(
                "burst duration must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            window_millis: 1000 / requests_per_second as u64,
            burst_duration_millis,
            burst_reset_period_millis,
            last_emission: 0,
            burst_start: 0,
            drop_count: 0,
            total_dropped: 0,
        })
    }

    /// Decides the fate of an item arriving at `now_millis`. Timestamps
    /// must be monotonically non-decreasing across calls.
    pub fn offer(&mut self, now_millis: u64) -> RateDecision {
        if now_millis.saturating_sub(self.last_emission) >= self.window_millis {
            if self.burst_start != 0
                && now_millis - self.burst_start > self.burst_reset_period_millis
            {
                self.burst_start = 0;
            }
            self.last_emission = now_millis;
            RateDecision::Emit {
                drop_notice: self.flush_drops(),
            }
        } else {
            if self.burst_start == 0 {
                self.burst_start = now_millis;
            }
            if now_millis - self.burst_start <= self.burst_duration_millis {
                // Inside the burst window rate limiting is suspended.
                self.last_emission = now_millis;
                RateDecision::Emit {
                    drop_notice: self.flush_drops(),
                }
            } else {
                self.drop_count += 1;
                RateDecision::Drop
            }
        }
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    fn flush_drops(&mut self) -> Option<DropNotice> {
        if self.drop_count == 0 {
            return None;
        }
        self.total_dropped += self.drop_count;
        let notice = DropNotice {
            dropped: self.drop_count,
            total_dropped: self.total_dropped,
        };
        self.drop_count = 0;
        Some(notice)
    }
}
