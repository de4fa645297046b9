//! Named log producer.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;

use crate::fallback;
use crate::level::Level;
use crate::registry::{Collector, LevelState};
use crate::span::Span;
use crate::types::{LogRecord, SpanRef};

/// Emits log records for one named component. Obtained from the runtime's
/// registry, never constructed directly.
pub struct Logger {
    name: String,
    state: Mutex<LevelState>,
    tx: UnboundedSender<LogRecord>,
}

impl Logger {
    pub(crate) fn new(
        name: impl Into<String>,
        level: Level,
        tx: UnboundedSender<LogRecord>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(LevelState::new(level)),
            tx,
        })
    }

    /// Whether a record at `level` would currently pass this logger's gate.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Emits a record, optionally correlated with an open span and carrying
    /// an error's message. Gated records are dropped without allocation.
    pub fn log(
        &self,
        level: Level,
        span: Option<&Span>,
        message: impl Into<String>,
        error: Option<&dyn std::error::Error>,
    ) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord {
            sequence: 0,
            level,
            logger: self.name.clone(),
            message: message.into(),
            timestamp: Utc::now(),
            thread: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            span: span.map(|s| SpanRef {
                trace_id: s.trace_id().to_string(),
                span_id: s.span_id().to_string(),
            }),
            error: error.map(|e| e.to_string()),
        };
        if self.tx.send(record).is_err() {
            fallback::event_dropped("logging");
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::Trace, None, message, None);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, None, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, None, message, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, None, message, None);
    }

    pub fn error(&self, message: impl Into<String>, error: Option<&dyn std::error::Error>) {
        self.log(Level::Error, None, message, error);
    }
}

impl Collector for Logger {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::Tracer;
    use tokio::sync::mpsc;

    fn logger(level: Level) -> (Arc<Logger>, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Logger::new("app.db", level, tx), rx)
    }

    #[test]
    fn test_records_carry_identity() {
        let (logger, mut rx) = logger(Level::Info);
        logger.info("connected");
        let record = rx.try_recv().unwrap();
        assert_eq!(record.logger, "app.db");
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.message, "connected");
        assert!(record.span.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_level_gate() {
        let (logger, mut rx) = logger(Level::Warn);
        logger.info("quiet");
        logger.debug("quieter");
        assert!(rx.try_recv().is_err());
        logger.warn("loud");
        assert_eq!(rx.try_recv().unwrap().level, Level::Warn);
        assert!(logger.enabled(Level::Error));
        assert!(!logger.enabled(Level::Info));
    }

    #[test]
    fn test_mute_silences_and_unmute_restores() {
        let (logger, mut rx) = logger(Level::Debug);
        logger.mute();
        logger.error("dropped", None);
        assert!(rx.try_recv().is_err());
        logger.unmute();
        logger.debug("back");
        assert_eq!(rx.try_recv().unwrap().level, Level::Debug);
    }

    #[test]
    fn test_error_message_captured() {
        let (logger, mut rx) = logger(Level::Info);
        let err = std::io::Error::other("connection reset");
        logger.error("query failed", Some(&err));
        let record = rx.try_recv().unwrap();
        assert_eq!(record.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_span_correlation() {
        let (span_tx, _span_rx) = mpsc::unbounded_channel();
        let tracer = Tracer::new("svc", Level::Info, span_tx);
        let span = tracer.span("op", None);

        let (logger, mut rx) = logger(Level::Info);
        logger.log(Level::Info, Some(&span), "inside span", None);
        let record = rx.try_recv().unwrap();
        let span_ref = record.span.unwrap();
        assert_eq!(span_ref.span_id, span.span_id());
        assert_eq!(span_ref.trace_id, span.trace_id());
    }
}
