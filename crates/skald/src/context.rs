//! Stack-shaped parenting for synchronous call trees.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::span::Span;
use crate::tracer::Tracer;
use crate::types::Tags;

/// Maintains a stack of open spans so nested scopes parent automatically.
/// One context per logical thread of work; it is not shared.
pub struct TraceContext {
    tracer: Arc<Tracer>,
    stack: Vec<Span>,
}

impl TraceContext {
    pub fn new(tracer: Arc<Tracer>) -> Self {
        Self {
            tracer,
            stack: Vec::new(),
        }
    }

    /// Seeds the context with an existing span, typically a remote span
    /// reconstructed from incoming request headers.
    pub fn with_parent(tracer: Arc<Tracer>, parent: Span) -> Self {
        Self {
            tracer,
            stack: vec![parent],
        }
    }

    /// The innermost open span, if any.
    pub fn current(&self) -> Option<&Span> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Runs `f` inside a new span parented on the current one. The span is
    /// started before `f` and ended after, even when `f` panics; a panic
    /// ends the span with error status and resumes unwinding.
    pub fn in_span<T>(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        let span = self.tracer.span(name, self.stack.last());
        span.start();
        self.stack.push(span);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        let span = self.stack.pop().unwrap();
        match outcome {
            Ok(value) => {
                span.end();
                value
            }
            Err(payload) => {
                span.end_with_error(&panic_message(&payload));
                panic::resume_unwind(payload);
            }
        }
    }

    /// Like [`TraceContext::in_span`] for fallible work: an `Err` records
    /// an escaped exception event and ends the span with error status.
    pub fn in_try_span<T, E: std::error::Error>(
        &mut self,
        name: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let span = self.tracer.span(name, self.stack.last());
        span.start();
        self.stack.push(span);
        let outcome = f(self);
        let span = self.stack.pop().unwrap();
        match outcome {
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
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::span::{SpanRecord, SpanStatus};
    use tokio::sync::mpsc;

    fn context() -> (TraceContext, mpsc::UnboundedReceiver<SpanRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new("svc", Level::Info, tx);
        (TraceContext::new(tracer), rx)
    }

    #[test]
    fn test_nested_scopes_parent_automatically() {
        let (mut ctx, mut rx) = context();
        ctx.in_span("outer", |ctx| {
            ctx.in_span("inner", |ctx| {
                assert_eq!(ctx.depth(), 2);
            });
        });
        assert_eq!(ctx.depth(), 0);

        // Inner ends first.
        let inner = rx.try_recv().unwrap();
        let outer = rx.try_recv().unwrap();
        assert_eq!(inner.name, "inner");
        assert_eq!(outer.name, "outer");
        assert_eq!(inner.parent_id.as_deref(), Some(&*outer.context.span_id));
        assert_eq!(inner.context.trace_id, outer.context.trace_id);
    }

    #[test]
    fn test_panic_ends_span_with_error_and_propagates() {
        let (mut ctx, mut rx) = context();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            ctx.in_span("doomed", |_ctx| panic!("kaboom"));
        }));
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 0);

        let record = rx.try_recv().unwrap();
        assert_eq!(
            record.status,
            SpanStatus::Error {
                message: "kaboom".to_string()
            }
        );
    }

    #[test]
    fn test_try_span_records_error() {
        let (mut ctx, mut rx) = context();
        let result: Result<(), std::io::Error> =
            ctx.in_try_span("fallible", |_ctx| Err(std::io::Error::other("nope")));
        assert!(result.is_err());

        let record = rx.try_recv().unwrap();
        assert!(matches!(record.status, SpanStatus::Error { .. }));
        assert_eq!(record.events[0].name, "exception");
    }

    #[test]
    fn test_with_parent_seeds_remote_context() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new("svc", Level::Info, tx);
        let remote = tracer.remote_span("00000000000000ab", "feedfacefeedface");
        let mut ctx = TraceContext::with_parent(tracer, remote);

        ctx.in_span("handler", |_ctx| {});

        let record = rx.try_recv().unwrap();
        assert_eq!(record.context.trace_id, "feedfacefeedface");
        assert_eq!(record.parent_id.as_deref(), Some("00000000000000ab"));
        // The seeded remote parent itself never publishes.
        assert!(rx.try_recv().is_err());
    }
}
