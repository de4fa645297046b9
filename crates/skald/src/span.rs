//! The span state machine and the records it publishes.
//!
//! A [`Span`] is a cheaply cloneable handle over shared state. It moves
//! through `Created -> Started -> Ended` at most once each; only a span
//! that actually started publishes a [`SpanRecord`] to the bus, exactly
//! once, at the moment it ends. Remote spans never start, end, or publish:
//! they exist only to anchor trace/parent ids for locally created children.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::fallback;
use crate::level::Level;
use crate::otel;
use crate::types::{Sequenced, Tags};

/// Outcome of a span's execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "lowercase")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error { message: String },
}

/// Trace and span identifiers plus the producing tracer's identity.
#[derive(Debug, Clone, Serialize)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
    /// Whether the span context was received from elsewhere rather than
    /// created locally.
    pub is_remote: bool,
    pub tracer: TracerInfo,
}

/// Snapshot of the tracer at span-creation time.
#[derive(Debug, Clone, Serialize)]
pub struct TracerInfo {
    pub name: String,
    pub level: Level,
}

/// A point-in-time occurrence recorded inside a span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub attributes: Tags,
}

/// Immutable snapshot of an ended span, published to the tracing domain.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    /// Assigned by the tracing dispatch worker at dequeue time.
    pub sequence: u64,
    pub name: String,
    pub level: Level,
    pub context: SpanContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub attributes: Tags,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
}

impl Sequenced for SpanRecord {
    fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Started,
    Ended,
}

#[derive(Debug)]
struct SpanState {
    phase: Phase,
    start_at: Option<DateTime<Utc>>,
    attributes: Tags,
    events: Vec<SpanEvent>,
}

#[derive(Debug)]
pub(crate) struct SpanInner {
    name: String,
    level: Level,
    context: SpanContext,
    parent: Option<Arc<SpanInner>>,
    /// Absent for remote spans, which never publish.
    bus: Option<UnboundedSender<SpanRecord>>,
    state: Mutex<SpanState>,
}

/// Handle to a span. Clones share state; `start`/`end` are idempotent and
/// race-safe behind a per-span lock.
#[derive(Debug, Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn local(
        name: impl Into<String>,
        level: Level,
        span_id: String,
        trace_id: String,
        tracer: TracerInfo,
        parent: Option<&Span>,
        bus: UnboundedSender<SpanRecord>,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                name: name.into(),
                level,
                context: SpanContext {
                    trace_id,
                    span_id,
                    is_remote: false,
                    tracer,
                },
                parent: parent.map(|p| p.inner.clone()),
                bus: Some(bus),
                state: Mutex::new(SpanState {
                    phase: Phase::Created,
                    start_at: None,
                    attributes: Tags::new(),
                    events: Vec::new(),
                }),
            }),
        }
    }

    pub(crate) fn remote(
        name: impl Into<String>,
        level: Level,
        span_id: String,
        trace_id: String,
        tracer: TracerInfo,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                name: name.into(),
                level,
                context: SpanContext {
                    trace_id,
                    span_id,
                    is_remote: true,
                    tracer,
                },
                parent: None,
                bus: None,
                state: Mutex::new(SpanState {
                    phase: Phase::Created,
                    start_at: None,
                    attributes: Tags::new(),
                    events: Vec::new(),
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn level(&self) -> Level {
        self.inner.level
    }

    pub fn context(&self) -> &SpanContext {
        &self.inner.context
    }

    pub fn trace_id(&self) -> &str {
        &self.inner.context.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.inner.context.span_id
    }

    pub fn is_remote(&self) -> bool {
        self.inner.context.is_remote
    }

    /// Remote spans and spans below their tracer's level never record:
    /// every operation on them is a cheap no-op.
    fn should_record(&self) -> bool {
        !self.inner.context.is_remote && self.inner.level >= self.inner.context.tracer.level
    }

    fn should_record_event(&self, level: Level) -> bool {
        self.should_record() && level >= self.inner.level
    }

    /// Starts the span. Idempotent; a no-op for remote or level-gated spans.
    pub fn start(&self) -> &Self {
        if !self.should_record() {
            return self;
        }
        let mut state = self.inner.state.lock().unwrap();
        if state.phase != Phase::Created {
            return self;
        }
        state.start_at = Some(Utc::now());
        state.phase = Phase::Started;
        self
    }

    /// Ends the span with `Ok` status. Idempotent; publishes the record to
    /// the bus iff the span actually started.
    pub fn end(&self) {
        self.finish(None);
    }

    /// Ends the span with `Error` status carrying the error's message.
    pub fn end_with_error(&self, error: &dyn std::fmt::Display) {
        self.finish(Some(error.to_string()));
    }

    fn finish(&self, error: Option<String>) {
        if !self.should_record() {
            return;
        }
        let record = {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase != Phase::Started {
                return;
            }
            state.phase = Phase::Ended;
            let end_at = Utc::now();
            let start_at = state.start_at.unwrap_or(end_at);
            let status = match error {
                Some(message) => SpanStatus::Error { message },
                None => SpanStatus::Ok,
            };
            SpanRecord {
                sequence: 0,
                name: self.inner.name.clone(),
                level: self.inner.level,
                context: self.inner.context.clone(),
                parent_id: self
                    .inner
                    .parent
                    .as_ref()
                    .map(|p| p.context.span_id.clone()),
                start_at,
                end_at,
                duration_ms: (end_at - start_at).num_milliseconds().max(0) as u64,
                status,
                attributes: std::mem::take(&mut state.attributes),
                events: std::mem::take(&mut state.events),
            }
        };
        if let Some(bus) = &self.inner.bus {
            if bus.send(record).is_err() {
                fallback::event_dropped("tracing");
            }
        }
    }

    /// Records an event iff the span is started, not yet ended, and `level`
    /// passes the span's own gate. Dropped otherwise.
    pub fn event(&self, name: impl Into<String>, level: Level, attributes: Tags) {
        if !self.should_record_event(level) {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        if state.phase != Phase::Started {
            return;
        }
        state.events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        });
    }

    /// Records an exception event with the fixed OpenTelemetry attribute
    /// keys. `escaped` marks whether the error propagated out of the span's
    /// scope. Subject to the same lifecycle gate as [`Span::event`].
    pub fn exception<E: std::error::Error>(&self, error: &E, escaped: bool, attributes: Tags) {
        let mut attrs = attributes;
        attrs.insert(
            otel::EXCEPTION_TYPE.to_string(),
            std::any::type_name::<E>().into(),
        );
        attrs.insert(otel::EXCEPTION_MESSAGE.to_string(), error.to_string().into());
        attrs.insert(
            otel::EXCEPTION_STACKTRACE.to_string(),
            error_chain(error).into(),
        );
        attrs.insert(otel::EXCEPTION_ESCAPED.to_string(), escaped.into());
        self.event(otel::EXCEPTION, self.inner.level, attrs);
    }

    /// Sets an attribute. Attributes are mutable until the span ends.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        if !self.should_record() {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        if state.phase == Phase::Ended {
            return;
        }
        state.attributes.insert(key.into(), value.into());
    }

    /// Whether the span has started and not yet ended.
    pub fn is_recording(&self) -> bool {
        self.should_record() && self.inner.state.lock().unwrap().phase == Phase::Started
    }
}

/// Renders an error and its source chain as the stacktrace text.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
