//! Embeddable telemetry runtime: logging, tracing, and metering over a
//! shared asynchronous event bus.
//!
//! Producers (loggers, tracers, meters) enqueue events without blocking;
//! each domain's dispatch worker stamps arrival-order sequence ids and fans
//! events out to registered appenders, isolating appender failures from
//! producers and from each other.
//!
//! # Usage
//!
//! ```rust,no_run
//! use skald::{Telemetry, testing::RecordingAppender};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let telemetry = Telemetry::new();
//!     telemetry
//!         .log_appenders()
//!         .register(Arc::new(RecordingAppender::new("captured")));
//!
//!     let logger = telemetry.logger("app.server");
//!     logger.info("listening on :8080");
//!
//!     let tracer = telemetry.tracer("app.server");
//!     let span = tracer.span("handle-request", None);
//!     span.start();
//!     logger.log(skald::Level::Debug, Some(&span), "routed", None);
//!     span.end();
//! }
//! ```

pub mod appenders;
pub mod bus;
pub mod context;
pub mod error;
mod fallback;
pub mod level;
pub mod logger;
pub mod meter;
pub mod otel;
pub mod registry;
pub mod span;
pub mod stream;
pub mod testing;
pub mod tracer;
pub mod types;

// Re-export main types
pub use appenders::{
    Appender, BatchStage, BufferedAppender, FloodStage, FlowAppender, FlowSink, InstrumentInfo,
    JsonlAppender, MeterCollectorAppender, Series, Stage,
};
pub use bus::{Telemetry, TelemetryConfig};
pub use context::TraceContext;
pub use error::{Result, TelemetryError};
pub use level::Level;
pub use logger::Logger;
pub use meter::{Counter, Gauge, Meter, UpDownCounter};
pub use registry::{AppenderRegistry, Collector, CollectorRegistry};
pub use span::{Span, SpanContext, SpanEvent, SpanRecord, SpanStatus, TracerInfo};
pub use stream::{Batcher, BoundedBuffer, DropNotice, OverflowPolicy, RateLimiter};
pub use tracer::Tracer;
pub use types::{
    InstrumentKind, LogRecord, MetricEvent, MetricEventKind, MetricValue, Sequenced, SpanRef, Tags,
};
