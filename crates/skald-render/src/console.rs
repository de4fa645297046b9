//! ANSI console rendering.

use async_trait::async_trait;
use skald::{Appender, Level, LogRecord, MetricEvent, Result, SpanRecord, SpanStatus};

const RESET: &str = "\x1b[0m";
const GREY: &str = "\x1b[90m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const PURPLE: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";

const MAX_LOGGER_WIDTH: usize = 36;

fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Trace | Level::Debug => GREY,
        Level::Info => BLUE,
        Level::Warn => YELLOW,
        Level::Error | Level::Off => RED,
    }
}

/// Shortens a dotted name to at most `MAX_LOGGER_WIDTH` characters by
/// collapsing leading segments to their initial, leftmost first. The final
/// segment is never collapsed.
pub fn compact_name(name: &str) -> String {
    if name.len() <= MAX_LOGGER_WIDTH {
        return name.to_string();
    }
    let mut segments: Vec<String> = name.split('.').map(str::to_string).collect();
    for i in 0..segments.len().saturating_sub(1) {
        if segments.join(".").len() <= MAX_LOGGER_WIDTH {
            break;
        }
        segments[i] = segments[i].chars().take(1).collect();
    }
    segments.join(".")
}

/// One log record as a single console line.
pub fn format_log(record: &LogRecord, colors: bool) -> String {
    let mut line = format!(
        "{:>6} {} {} [{}] {:>5} {} : {}",
        record.sequence,
        paint(
            &record
                .span
                .as_ref()
                .map(|s| s.span_id.clone())
                .unwrap_or_else(|| "-".repeat(16)),
            PURPLE,
            colors
        ),
        paint(
            &record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            GREEN,
            colors
        ),
        record.thread,
        paint(record.level.as_str(), level_color(record.level), colors),
        paint(&compact_name(&record.logger), CYAN, colors),
        record.message,
    );
    if let Some(error) = &record.error {
        line.push_str(&format!(" {}", paint(error, RED, colors)));
    }
    line
}

/// One ended span as a single console line.
pub fn format_span(record: &SpanRecord, colors: bool) -> String {
    let status = match &record.status {
        SpanStatus::Unset => paint("unset", GREY, colors),
        SpanStatus::Ok => paint("ok", GREEN, colors),
        SpanStatus::Error { message } => paint(&format!("error: {message}"), RED, colors),
    };
    format!(
        "{:>6} {} {} {:>5} {} {}ms {} ({} events)",
        record.sequence,
        paint(&record.context.span_id, PURPLE, colors),
        paint(
            &record.start_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            GREEN,
            colors
        ),
        paint(record.level.as_str(), level_color(record.level), colors),
        paint(&compact_name(&record.name), CYAN, colors),
        record.duration_ms,
        status,
        record.events.len(),
    )
}

/// One metering event as a single console line.
pub fn format_metric(event: &MetricEvent, colors: bool) -> String {
    format!(
        "{:>6} {} {} {}",
        event.sequence,
        paint(
            &event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            GREEN,
            colors
        ),
        paint(&compact_name(&event.name), CYAN, colors),
        serde_json::to_string(&event.kind).unwrap_or_default(),
    )
}

/// Prints each log record as a colored line on stdout.
pub struct ConsoleLogAppender {
    colors: bool,
}

impl ConsoleLogAppender {
    pub fn new() -> Self {
        Self { colors: true }
    }

    pub fn plain() -> Self {
        Self { colors: false }
    }
}

impl Default for ConsoleLogAppender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Appender<LogRecord> for ConsoleLogAppender {
    fn name(&self) -> &str {
        "console"
    }

    async fn append(&self, record: &LogRecord) -> Result<()> {
        println!("{}", format_log(record, self.colors));
        Ok(())
    }
}

/// Prints each ended span as a colored line on stdout.
pub struct ConsoleTraceAppender {
    colors: bool,
}

impl ConsoleTraceAppender {
    pub fn new() -> Self {
        Self { colors: true }
    }

    pub fn plain() -> Self {
        Self { colors: false }
    }
}

impl Default for ConsoleTraceAppender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Appender<SpanRecord> for ConsoleTraceAppender {
    fn name(&self) -> &str {
        "console"
    }

    async fn append(&self, record: &SpanRecord) -> Result<()> {
        println!("{}", format_span(record, self.colors));
        Ok(())
    }
}

/// Prints each metering event as a colored line on stdout.
pub struct ConsoleMeterAppender {
    colors: bool,
}

impl ConsoleMeterAppender {
    pub fn new() -> Self {
        Self { colors: true }
    }

    pub fn plain() -> Self {
        Self { colors: false }
    }
}

impl Default for ConsoleMeterAppender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Appender<MetricEvent> for ConsoleMeterAppender {
    fn name(&self) -> &str {
        "console"
    }

    async fn append(&self, event: &MetricEvent) -> Result<()> {
        println!("{}", format_metric(event, self.colors));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(logger: &str, error: Option<String>) -> LogRecord {
        LogRecord {
            sequence: 7,
            level: Level::Warn,
            logger: logger.to_string(),
            message: "cache miss".to_string(),
            timestamp: Utc::now(),
            thread: "main".to_string(),
            span: None,
            error,
        }
    }

    #[test]
    fn test_compact_name_short_names_untouched() {
        assert_eq!(compact_name("app.server"), "app.server");
    }

    #[test]
    fn test_compact_name_collapses_leading_segments() {
        let name = "com.example.verylongservice.subsystem.component.Handler";
        let compact = compact_name(name);
        assert!(compact.starts_with("c.e."));
        assert!(compact.ends_with(".Handler"));
        assert!(compact.len() < name.len());
    }

    #[test]
    fn test_compact_name_never_collapses_last_segment() {
        let name = format!("a.{}", "x".repeat(50));
        let compact = compact_name(&name);
        assert!(compact.ends_with(&"x".repeat(50)));
    }

    #[test]
    fn test_format_log_plain_contains_fields() {
        let line = format_log(&record("app.db", None), false);
        assert!(line.contains("cache miss"));
        assert!(line.contains("WARN"));
        assert!(line.contains("app.db"));
        assert!(line.contains("[main]"));
        assert!(!line.contains("\x1b["));
    }

    #[test]
    fn test_format_log_appends_error() {
        let line = format_log(&record("app.db", Some("timeout".to_string())), false);
        assert!(line.ends_with("timeout"));
    }

    #[test]
    fn test_format_log_colored_emits_ansi() {
        let line = format_log(&record("app.db", None), true);
        assert!(line.contains(YELLOW));
        assert!(line.contains(RESET));
    }
}
