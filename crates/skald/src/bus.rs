//! The per-domain event bus and the `Telemetry` runtime that owns it.
//!
//! Each domain (logging, tracing, metering) gets an unbounded queue and one
//! dedicated dispatch worker. Producers enqueue without blocking; the worker
//! stamps the domain-scoped sequence id at dequeue time and fans each event
//! out to the domain's appenders in registration order. An appender failure
//! is reported on the side channel and never stops the fan-out.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::fallback;
use crate::level::Level;
use crate::logger::Logger;
use crate::meter::Meter;
use crate::registry::{AppenderRegistry, CollectorRegistry};
use crate::span::SpanRecord;
use crate::tracer::Tracer;
use crate::types::{LogRecord, MetricEvent, Sequenced};

/// Runtime configuration, deserializable from any serde source.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Level assigned to newly created loggers, tracers, and meters.
    #[serde(default = "default_level")]
    pub default_level: Level,
}

fn default_level() -> Level {
    Level::Info
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
        }
    }
}

/// One domain's queue, dispatch worker, and appender registry.
struct Hub<E: Sequenced + Send + 'static> {
    tx: UnboundedSender<E>,
    appenders: Arc<AppenderRegistry<E>>,
}

impl<E: Sequenced + Send + Sync + 'static> Hub<E> {
    /// Spawns the dispatch worker on the current tokio runtime. The worker
    /// exits once every sender is dropped and the queue drains.
    fn spawn(domain: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<E>();
        let appenders = Arc::new(AppenderRegistry::new());
        let registry = appenders.clone();
        tokio::spawn(async move {
            let mut sequence: u64 = 0;
            while let Some(mut event) = rx.recv().await {
                sequence += 1;
                event.set_sequence(sequence);
                for appender in registry.all() {
                    if let Err(err) = appender.append(&event).await {
                        fallback::append_failure(domain, appender.name(), &err);
                    }
                }
            }
        });
        Self { tx, appenders }
    }

    fn submit(&self, domain: &'static str, event: E) {
        if self.tx.send(event).is_err() {
            fallback::event_dropped(domain);
        }
    }
}

/// The telemetry runtime: three domain hubs plus the collector registries.
///
/// Must be created inside a tokio runtime. Dropping the last handle to a
/// producer plus the `Telemetry` itself closes the queues, letting the
/// dispatch workers drain and exit.
pub struct Telemetry {
    config: TelemetryConfig,
    logs: Hub<LogRecord>,
    traces: Hub<SpanRecord>,
    metrics: Hub<MetricEvent>,
    loggers: CollectorRegistry<Logger>,
    tracers: CollectorRegistry<Tracer>,
    meters: CollectorRegistry<Meter>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::with_config(TelemetryConfig::default())
    }

    pub fn with_config(config: TelemetryConfig) -> Self {
        Self {
            config,
            logs: Hub::spawn("logging"),
            traces: Hub::spawn("tracing"),
            metrics: Hub::spawn("metering"),
            loggers: CollectorRegistry::new(),
            tracers: CollectorRegistry::new(),
            meters: CollectorRegistry::new(),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Returns the logger registered under `name`, creating it at the
    /// configured default level on first use.
    pub fn logger(&self, name: &str) -> Arc<Logger> {
        self.loggers.get_or_register(name, || {
            Logger::new(name, self.config.default_level, self.logs.tx.clone())
        })
    }

    pub fn tracer(&self, name: &str) -> Arc<Tracer> {
        self.tracers.get_or_register(name, || {
            Tracer::new(name, self.config.default_level, self.traces.tx.clone())
        })
    }

    pub fn meter(&self, name: &str) -> Arc<Meter> {
        self.meters.get_or_register(name, || {
            Meter::new(name, self.config.default_level, self.metrics.tx.clone())
        })
    }

    pub fn loggers(&self) -> &CollectorRegistry<Logger> {
        &self.loggers
    }

    pub fn tracers(&self) -> &CollectorRegistry<Tracer> {
        &self.tracers
    }

    pub fn meters(&self) -> &CollectorRegistry<Meter> {
        &self.meters
    }

    pub fn log_appenders(&self) -> &AppenderRegistry<LogRecord> {
        &self.logs.appenders
    }

    pub fn trace_appenders(&self) -> &AppenderRegistry<SpanRecord> {
        &self.traces.appenders
    }

    pub fn metric_appenders(&self) -> &AppenderRegistry<MetricEvent> {
        &self.metrics.appenders
    }

    /// Enqueues a raw log record, bypassing logger gates. Used by bridges
    /// that already carry fully formed records.
    pub fn submit_log(&self, record: LogRecord) {
        self.logs.submit("logging", record);
    }

    pub fn submit_span(&self, record: SpanRecord) {
        self.traces.submit("tracing", record);
    }

    pub fn submit_metric(&self, event: MetricEvent) {
        self.metrics.submit("metering", event);
    }
}
