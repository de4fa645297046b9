//! Named span factory for one component.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::level::Level;
use crate::registry::{Collector, LevelState};
use crate::span::{Span, SpanRecord, TracerInfo};
use crate::types::Tags;

/// Creates spans for one named component and feeds their records into the
/// tracing domain. Obtained from the runtime's registry, never constructed
/// directly.
pub struct Tracer {
    name: String,
    state: Mutex<LevelState>,
    tx: UnboundedSender<SpanRecord>,
}

impl Tracer {
    pub(crate) fn new(
        name: impl Into<String>,
        level: Level,
        tx: UnboundedSender<SpanRecord>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(LevelState::new(level)),
            tx,
        })
    }

    /// Creates a span at the given level. The tracer's level is snapshotted
    /// into the span, so later level changes never affect live spans. The
    /// trace id is inherited from the parent when present, otherwise the
    /// new span roots its own trace.
    pub fn span_at(&self, name: impl Into<String>, level: Level, parent: Option<&Span>) -> Span {
        let span_id = new_span_id();
        let trace_id = match parent {
            Some(parent) => parent.trace_id().to_string(),
            None => span_id.clone(),
        };
        Span::local(
            name,
            level,
            span_id,
            trace_id,
            self.info(),
            parent,
            self.tx.clone(),
        )
    }

    /// Creates an `Info` span, the common case.
    pub fn span(&self, name: impl Into<String>, parent: Option<&Span>) -> Span {
        self.span_at(name, Level::Info, parent)
    }

    /// Reconstructs a span received from another process. Remote spans
    /// never start, end, or publish; they only anchor ids for local
    /// children.
    pub fn remote_span(&self, span_id: impl Into<String>, trace_id: impl Into<String>) -> Span {
        let span_id = span_id.into();
        Span::remote(
            format!("remote-{span_id}"),
            Level::Info,
            span_id,
            trace_id.into(),
            self.info(),
        )
    }

    /// Runs `f` inside a started span, ending it when `f` returns. An `Err`
    /// records an escaped exception event and ends the span with error
    /// status; the result passes through either way.
    pub fn in_span<T, E: std::error::Error>(
        &self,
        name: impl Into<String>,
        parent: Option<&Span>,
        f: impl FnOnce(&Span) -> Result<T, E>,
    ) -> Result<T, E> {
        let span = self.span(name, parent);
        span.start();
        match f(&span) {
            Ok(value) => {
                span.end();
                Ok(value)
            }
            Err(err) => {
                span.exception(&err, true, Tags::new());
                span.end_with_error(&err);
                Err(err)
            }
        }
    }

    fn info(&self) -> TracerInfo {
        TracerInfo {
            name: self.name.clone(),
            level: self.level(),
        }
    }
}

impl Collector for Tracer {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.state.lock().unwrap().level
    }

    fn set_level(&self, level: Level) {
        self.state.lock().unwrap().set(level);
    }

    fn mute(&self) {
        self.state.lock().unwrap().mute();
    }

    fn unmute(&self) {
        self.state.lock().unwrap().unmute();
    }
}

/// 16 lowercase hex characters.
pub(crate) fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
