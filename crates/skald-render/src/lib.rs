//! Rendering for skald telemetry events.
//!
//! - **Console**: one colored line per event, for humans
//! - **Json**: one JSON object per line on stdout, for machines
//! - **OpenMetrics**: text exposition of collected metric series

pub mod console;
pub mod json;
pub mod openmetrics;

pub use console::{
    ConsoleLogAppender, ConsoleMeterAppender, ConsoleTraceAppender, compact_name, format_log,
    format_metric, format_span,
};
pub use json::JsonConsoleAppender;
pub use openmetrics::render as render_openmetrics;
