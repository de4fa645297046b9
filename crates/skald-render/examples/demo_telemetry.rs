//! Demo of the telemetry runtime simulating a small web shop backend.

use std::sync::Arc;
use std::time::Duration;

use skald::{
    Level, MeterCollectorAppender, Tags, Telemetry, TelemetryConfig, TraceContext,
};
use skald_render::{ConsoleLogAppender, ConsoleTraceAppender, render_openmetrics};

fn simulate_order(telemetry: &Telemetry, order_id: u32) {
    let logger = telemetry.logger("shop.checkout");
    let tracer = telemetry.tracer("shop.checkout");
    let meter = telemetry.meter("shop.checkout");
    let orders = meter.counter("orders_total", Some("1"), Some("completed orders"));
    let latency = meter.gauge("checkout_latency_ms", Some("ms"), None);

    let mut ctx = TraceContext::new(tracer);
    ctx.in_span("place-order", |ctx| {
        logger.log(
            Level::Info,
            ctx.current(),
            format!("order {order_id} received"),
            None,
        );

        ctx.in_span("reserve-stock", |_ctx| {
            std::thread::sleep(Duration::from_millis(3));
        });
        ctx.in_span("charge-card", |ctx| {
            std::thread::sleep(Duration::from_millis(7));
            if let Some(span) = ctx.current() {
                span.set_attribute("provider", "acme-pay");
            }
        });

        let mut tags = Tags::new();
        tags.insert("region".to_string(), serde_json::json!("eu"));
        if let Err(err) = orders.increment(1, tags) {
            logger.error("failed to count order", Some(&err));
        }
        latency.record(10.0, Tags::new());
    });
}

#[tokio::main]
async fn main() {
    let telemetry = Telemetry::with_config(TelemetryConfig {
        default_level: Level::Debug,
    });

    let collector = Arc::new(MeterCollectorAppender::new());
    telemetry
        .log_appenders()
        .register(Arc::new(ConsoleLogAppender::new()));
    telemetry
        .trace_appenders()
        .register(Arc::new(ConsoleTraceAppender::new()));
    telemetry.metric_appenders().register(collector.clone());

    for order_id in 1..=3 {
        simulate_order(&telemetry, order_id);
    }

    // Let the dispatch workers drain before rendering the snapshot.
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\n--- Collected metrics ---");
    print!("{}", render_openmetrics(&collector.snapshot()));
}
