//! In-memory metric aggregation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::appenders::Appender;
use crate::error::Result;
use crate::fallback;
use crate::types::{InstrumentKind, MetricEvent, MetricEventKind, MetricValue, Tags};

/// Instrument metadata, fixed by the first registration of a name.
#[derive(Debug, Clone)]
pub struct InstrumentInfo {
    pub name: String,
    pub kind: InstrumentKind,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// One time series: an instrument plus a distinct label set.
#[derive(Debug, Clone)]
pub struct Series {
    pub key: u64,
    pub info: InstrumentInfo,
    pub tags: Tags,
    pub value: MetricValue,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct CollectorState {
    instruments: HashMap<String, InstrumentInfo>,
    series: HashMap<u64, Series>,
}

/// Folds the metering event stream into current series values, one per
/// `(instrument, label-set)` pair. Integer and float series never mix: a
/// measurement whose numeric type differs from its series is rejected.
/// Measurements for unregistered instruments are ignored.
#[derive(Default)]
pub struct MeterCollectorAppender {
    state: Mutex<CollectorState>,
}

impl MeterCollectorAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time snapshot of every series, sorted by instrument name
    /// then series key so rendered output is stable.
    pub fn snapshot(&self) -> Vec<Series> {
        let state = self.state.lock().unwrap();
        let mut series: Vec<Series> = state.series.values().cloned().collect();
        series.sort_by(|a, b| (&a.info.name, a.key).cmp(&(&b.info.name, b.key)));
        series
    }

    pub fn instrument(&self, name: &str) -> Option<InstrumentInfo> {
        self.state.lock().unwrap().instruments.get(name).cloned()
    }

    fn apply(&self, event: &MetricEvent) {
        let mut state = self.state.lock().unwrap();
        if let MetricEventKind::CreateInstrument {
            instrument,
            unit,
            description,
        } = &event.kind
        {
            // First registration wins.
            state
                .instruments
                .entry(event.name.clone())
                .or_insert_with(|| InstrumentInfo {
                    name: event.name.clone(),
                    kind: *instrument,
                    unit: unit.clone(),
                    description: description.clone(),
                });
            return;
        }

        let Some(info) = state.instruments.get(&event.name).cloned() else {
            return;
        };
        let Some((tags, value)) = event.measurement() else {
            return;
        };

        // Reject incompatible operations before creating the series, so an
        // invalid measurement never leaves a zero-valued entry behind.
        let merge = match (&event.kind, info.kind) {
            (
                MetricEventKind::Increment { .. },
                InstrumentKind::Counter | InstrumentKind::UpDownCounter,
            ) => add,
            (MetricEventKind::Decrement { .. }, InstrumentKind::UpDownCounter) => subtract,
            (
                MetricEventKind::Set { .. },
                InstrumentKind::Counter | InstrumentKind::UpDownCounter,
            )
            | (MetricEventKind::Record { .. }, InstrumentKind::Gauge) => assign,
            // Operation does not apply to this instrument kind.
            _ => return,
        };

        let key = event.series_key();
        let series = state.series.entry(key).or_insert_with(|| Series {
            key,
            info,
            tags: tags.clone(),
            value: match value {
                MetricValue::Int(_) => MetricValue::Int(0),
                MetricValue::Float(_) => MetricValue::Float(0.0),
            },
            updated_at: event.timestamp,
        });

        match merge(series.value, value) {
            Some(next) => {
                series.value = next;
                series.updated_at = event.timestamp;
            }
            None => fallback::series_type_mismatch(&event.name),
        }
    }
}

fn add(current: MetricValue, incoming: MetricValue) -> Option<MetricValue> {
    match (current, incoming) {
        (MetricValue::Int(a), MetricValue::Int(b)) => Some(MetricValue::Int(a + b)),
        (MetricValue::Float(a), MetricValue::Float(b)) => Some(MetricValue::Float(a + b)),
        _ => None,
    }
}

fn subtract(current: MetricValue, incoming: MetricValue) -> Option<MetricValue> {
    match (current, incoming) {
        (MetricValue::Int(a), MetricValue::Int(b)) => Some(MetricValue::Int(a - b)),
        (MetricValue::Float(a), MetricValue::Float(b)) => Some(MetricValue::Float(a - b)),
        _ => None,
    }
}

fn assign(current: MetricValue, incoming: MetricValue) -> Option<MetricValue> {
    match (current, incoming) {
        (MetricValue::Int(_), MetricValue::Int(_))
        | (MetricValue::Float(_), MetricValue::Float(_)) => Some(incoming),
        _ => None,
    }
}

#[async_trait]
impl Appender<MetricEvent> for MeterCollectorAppender {
    fn name(&self) -> &str {
        "meter-collector"
    }

    async fn append(&self, event: &MetricEvent) -> Result<()> {
        self.apply(event);
        Ok(())
    }
}
