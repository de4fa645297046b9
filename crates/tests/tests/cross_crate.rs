//! Cross-crate integration and E2E tests
//!
//! These tests verify that the crates work together correctly and exercise
//! full flows from producers through the bus to rendered output.

use std::sync::Arc;
use std::time::Duration;

use skald::testing::{FailingAppender, RecordingAppender};
use skald::{
    Collector, JsonlAppender, Level, MeterCollectorAppender, MetricValue, Tags, Telemetry,
    TelemetryConfig, TraceContext,
};
use skald_render::{format_log, format_span, render_openmetrics};

const WAIT: Duration = Duration::from_secs(2);

/// E2E: all three domains active at once, with a failing appender in the
/// logging fan-out, ending in rendered text for each domain.
#[tokio::test]
async fn test_e2e_three_domains_to_rendered_output() {
    let telemetry = Telemetry::with_config(TelemetryConfig {
        default_level: Level::Debug,
    });

    let logs = Arc::new(RecordingAppender::new("logs"));
    let spans = Arc::new(RecordingAppender::new("spans"));
    let collector = Arc::new(MeterCollectorAppender::new());
    let metrics = Arc::new(RecordingAppender::new("metrics"));

    telemetry
        .log_appenders()
        .register(Arc::new(FailingAppender::new("broken")));
    telemetry.log_appenders().register(logs.clone());
    telemetry.trace_appenders().register(spans.clone());
    telemetry.metric_appenders().register(collector.clone());
    telemetry.metric_appenders().register(metrics.clone());

    // Tracing: a request with a nested query, correlated logging inside.
    let tracer = telemetry.tracer("shop.checkout");
    let logger = telemetry.logger("shop.checkout");
    let meter = telemetry.meter("shop.checkout");
    let orders = meter.counter("orders_total", Some("1"), Some("completed orders"));

    let mut ctx = TraceContext::new(tracer);
    ctx.in_span("place-order", |ctx| {
        logger.log(
            Level::Info,
            ctx.current(),
            "order received",
            None,
        );
        ctx.in_span("charge-card", |_ctx| {});
        let mut tags = Tags::new();
        tags.insert("region".to_string(), serde_json::json!("eu"));
        orders.increment(1, tags).unwrap();
    });

    assert!(logs.wait_for(1, WAIT).await);
    assert!(spans.wait_for(2, WAIT).await);
    assert!(metrics.wait_for(2, WAIT).await);

    // Log record is span-correlated and renders with its logger name.
    let log = &logs.events()[0];
    let outer = &spans.events()[1];
    assert_eq!(
        log.span.as_ref().unwrap().span_id,
        outer.context.span_id
    );
    let line = format_log(log, false);
    assert!(line.contains("shop.checkout"));
    assert!(line.contains("order received"));

    // Inner span renders with parent linkage intact.
    let inner = &spans.events()[0];
    assert_eq!(inner.name, "charge-card");
    assert_eq!(inner.parent_id.as_deref(), Some(&*outer.context.span_id));
    assert!(format_span(inner, false).contains("charge-card"));

    // Metrics folded and rendered as OpenMetrics text.
    let snapshot = collector.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].value, MetricValue::Int(1));
    let text = render_openmetrics(&snapshot);
    assert!(text.contains("# HELP orders_total completed orders"));
    assert!(text.contains("# TYPE orders_total counter"));
    assert!(text.contains("orders_total{region=\"eu\"} 1 "));
}

/// E2E: log records persisted as JSONL survive a round trip and keep their
/// arrival-order sequences.
#[tokio::test]
async fn test_e2e_jsonl_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry").join("logs.jsonl");

    let telemetry = Telemetry::new();
    let recorder = Arc::new(RecordingAppender::new("rec"));
    telemetry
        .log_appenders()
        .register(Arc::new(JsonlAppender::new("file", &path).unwrap()));
    telemetry.log_appenders().register(recorder.clone());

    let logger = telemetry.logger("app");
    for i in 0..10 {
        logger.info(format!("message {i}"));
    }
    assert!(recorder.wait_for(10, WAIT).await);

    let lines: Vec<serde_json::Value> = skald::appenders::read_jsonl(&path).unwrap();
    assert_eq!(lines.len(), 10);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["sequence"], i as u64 + 1);
        assert_eq!(line["message"], format!("message {i}"));
        assert_eq!(line["logger"], "app");
    }
}

/// E2E: muting by name works across all three registries and survives
/// collector re-creation.
#[tokio::test]
async fn test_e2e_mute_across_domains() {
    let telemetry = Telemetry::new();
    let logs = Arc::new(RecordingAppender::new("logs"));
    let metrics = Arc::new(RecordingAppender::new("metrics"));
    telemetry.log_appenders().register(logs.clone());
    telemetry.metric_appenders().register(metrics.clone());

    // Pre-mute before the collectors exist.
    telemetry.loggers().mute("noisy");
    telemetry.meters().mute("noisy");

    let logger = telemetry.logger("noisy");
    let meter = telemetry.meter("noisy");
    assert!(logger.is_muted());
    assert!(meter.is_muted());

    logger.error("silenced", None);
    let counter = meter.counter("hits", None, None);
    counter.increment(1, Tags::new()).unwrap();

    telemetry.logger("app").info("heard");
    assert!(logs.wait_for(1, WAIT).await);
    assert_eq!(logs.events().len(), 1);
    assert!(metrics.is_empty());

    // Unmute restores the pre-mute level.
    telemetry.loggers().unmute("noisy");
    assert_eq!(logger.level(), Level::Info);
    logger.info("audible again");
    assert!(logs.wait_for(2, WAIT).await);
}
