//! Event types carried by the telemetry bus.
//!
//! Each domain (logging, tracing, metering) has its own record type. All of
//! them carry a domain-scoped `sequence` id that the dispatch worker stamps
//! at dequeue time, so it reflects arrival order at the bus rather than
//! creation order at the producer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::level::Level;

/// Attributes attached to spans, span events, and metric measurements.
///
/// A `BTreeMap` keeps iteration deterministic, which makes label-set
/// identity hashing and rendered output stable.
pub type Tags = BTreeMap<String, serde_json::Value>;

/// Implemented by every bus event so the dispatch worker can stamp the
/// domain-scoped sequence id.
pub trait Sequenced {
    fn set_sequence(&mut self, sequence: u64);
}

/// A single log statement, captured at the call site.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Assigned by the logging dispatch worker at dequeue time.
    pub sequence: u64,
    pub level: Level,
    /// Name of the logger that produced the record.
    pub logger: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Name of the producing thread.
    pub thread: String,
    /// Span the record was produced under, for trace correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanRef>,
    /// Rendered error text, if the call site supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sequenced for LogRecord {
    fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

/// Minimal span reference carried on log records.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRef {
    pub trace_id: String,
    pub span_id: String,
}

/// The numeric payload of a metric measurement.
///
/// Integer and floating-point series are tracked separately; the collector
/// appender rejects a measurement whose type does not match its series
/// rather than coercing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn is_negative(&self) -> bool {
        match self {
            MetricValue::Int(v) => *v < 0,
            MetricValue::Float(v) => *v < 0.0,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v as f64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

/// The kinds of metric instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// Monotonically increasing value.
    Counter,
    /// Value that can increase and decrease.
    UpDownCounter,
    /// Last-value recording.
    Gauge,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::UpDownCounter => "updowncounter",
            InstrumentKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metering event: instrument registration or a single measurement.
#[derive(Debug, Clone, Serialize)]
pub struct MetricEvent {
    /// Assigned by the metering dispatch worker at dequeue time.
    pub sequence: u64,
    /// Instrument name.
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MetricEventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetricEventKind {
    /// Registers instrument metadata. First registration wins; later ones
    /// for the same name are ignored by collectors.
    CreateInstrument {
        instrument: InstrumentKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Increment { tags: Tags, value: MetricValue },
    Decrement { tags: Tags, value: MetricValue },
    Set { tags: Tags, value: MetricValue },
    Record { tags: Tags, value: MetricValue },
}

impl MetricEvent {
    fn now(name: impl Into<String>, kind: MetricEventKind) -> Self {
        Self {
            sequence: 0,
            name: name.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn create_instrument(
        name: impl Into<String>,
        instrument: InstrumentKind,
        unit: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self::now(
            name,
            MetricEventKind::CreateInstrument {
                instrument,
                unit,
                description,
            },
        )
    }

    pub fn increment(name: impl Into<String>, tags: Tags, value: MetricValue) -> Self {
        Self::now(name, MetricEventKind::Increment { tags, value })
    }

    pub fn decrement(name: impl Into<String>, tags: Tags, value: MetricValue) -> Self {
        Self::now(name, MetricEventKind::Decrement { tags, value })
    }

    pub fn set(name: impl Into<String>, tags: Tags, value: MetricValue) -> Self {
        Self::now(name, MetricEventKind::Set { tags, value })
    }

    pub fn record(name: impl Into<String>, tags: Tags, value: MetricValue) -> Self {
        Self::now(name, MetricEventKind::Record { tags, value })
    }

    /// Tags and value for measurement events; `None` for `CreateInstrument`.
    pub fn measurement(&self) -> Option<(&Tags, MetricValue)> {
        match &self.kind {
            MetricEventKind::CreateInstrument { .. } => None,
            MetricEventKind::Increment { tags, value }
            | MetricEventKind::Decrement { tags, value }
            | MetricEventKind::Set { tags, value }
            | MetricEventKind::Record { tags, value } => Some((tags, *value)),
        }
    }

    /// Identity of the time series this event belongs to.
    ///
    /// Two measurements with the same instrument name but different label
    /// sets are different series. `CreateInstrument` keys on the name alone.
    pub fn series_key(&self) -> u64 {
        match self.measurement() {
            Some((tags, _)) => series_key(&self.name, tags),
            None => series_key(&self.name, &Tags::new()),
        }
    }
}

impl Sequenced for MetricEvent {
    fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

/// Stable in-process hash of `(name, label-set)`.
pub fn series_key(name: &str, tags: &Tags) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    for (k, v) in tags {
        k.hash(&mut hasher);
        v.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(pairs: &[(&str, serde_json::Value)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_metric_value_negativity() {
        assert!(MetricValue::from(-1).is_negative());
        assert!(MetricValue::from(-1i64).is_negative());
        assert!(MetricValue::from(-0.5f32).is_negative());
        assert!(MetricValue::from(-0.5f64).is_negative());
        assert!(!MetricValue::from(0).is_negative());
        assert!(!MetricValue::from(2.5).is_negative());
    }

    #[test]
    fn test_series_identity_differs_by_label_set() {
        let a = MetricEvent::increment("requests", tags(&[("code", json!(200))]), 1.into());
        let b = MetricEvent::increment("requests", tags(&[("code", json!(500))]), 1.into());
        let c = MetricEvent::increment("requests", tags(&[("code", json!(200))]), 5.into());
        assert_ne!(a.series_key(), b.series_key());
        assert_eq!(a.series_key(), c.series_key());
    }

    #[test]
    fn test_series_identity_differs_by_name() {
        let a = MetricEvent::increment("requests", Tags::new(), 1.into());
        let b = MetricEvent::increment("responses", Tags::new(), 1.into());
        assert_ne!(a.series_key(), b.series_key());
    }

    #[test]
    fn test_log_record_serialization_skips_empty_fields() {
        let record = LogRecord {
            sequence: 1,
            level: Level::Info,
            logger: "app".to_string(),
            message: "hello".to_string(),
            timestamp: Utc::now(),
            thread: "main".to_string(),
            span: None,
            error: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"message\":\"hello\""));
        assert!(!json.contains("span"));
        assert!(!json.contains("error"));
    }
}
