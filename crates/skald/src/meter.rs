//! Named metric producer and its instrument handles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::{Result, TelemetryError};
use crate::fallback;
use crate::level::Level;
use crate::registry::{Collector, LevelState};
use crate::types::{InstrumentKind, MetricEvent, MetricValue, Tags};

/// Creates instruments for one named component and feeds their events into
/// the metering domain. Obtained from the runtime's registry, never
/// constructed directly.
pub struct Meter {
    name: String,
    state: Mutex<LevelState>,
    tx: UnboundedSender<MetricEvent>,
}

impl Meter {
    pub(crate) fn new(
        name: impl Into<String>,
        level: Level,
        tx: UnboundedSender<MetricEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(LevelState::new(level)),
            tx,
        })
    }

    /// Creates a counter, announcing the instrument unless the meter is
    /// muted. The returned handle stays bound to this meter's mute state.
    pub fn counter(
        self: &Arc<Self>,
        name: impl Into<String>,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> Counter {
        let name = name.into();
        self.announce(&name, InstrumentKind::Counter, unit, description);
        Counter {
            meter: self.clone(),
            name,
        }
    }

    pub fn up_down_counter(
        self: &Arc<Self>,
        name: impl Into<String>,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> UpDownCounter {
        let name = name.into();
        self.announce(&name, InstrumentKind::UpDownCounter, unit, description);
        UpDownCounter {
            meter: self.clone(),
            name,
        }
    }

    pub fn gauge(
        self: &Arc<Self>,
        name: impl Into<String>,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> Gauge {
        let name = name.into();
        self.announce(&name, InstrumentKind::Gauge, unit, description);
        Gauge {
            meter: self.clone(),
            name,
        }
    }

    fn announce(
        &self,
        name: &str,
        instrument: InstrumentKind,
        unit: Option<&str>,
        description: Option<&str>,
    ) {
        if self.is_muted() {
            return;
        }
        self.emit(MetricEvent::create_instrument(
            name,
            instrument,
            unit.map(str::to_string),
            description.map(str::to_string),
        ));
    }

    fn emit(&self, event: MetricEvent) {
        if self.tx.send(event).is_err() {
            fallback::event_dropped("metering");
        }
    }
}

impl Collector for Meter {
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

fn reject_negative(instrument: &str, name: &str, value: MetricValue) -> Result<()> {
    if value.is_negative() {
        return Err(TelemetryError::InvalidValue(format!(
            "{instrument} '{name}' rejects negative value {value}"
        )));
    }
    Ok(())
}

/// Monotonic counter. Negative amounts are rejected even while muted.
pub struct Counter {
    meter: Arc<Meter>,
    name: String,
}

impl Counter {
    pub fn increment(&self, value: impl Into<MetricValue>, tags: Tags) -> Result<()> {
        let value = value.into();
        reject_negative("counter", &self.name, value)?;
        if self.meter.is_muted() {
            return Ok(());
        }
        self.meter.emit(MetricEvent::increment(&self.name, tags, value));
        Ok(())
    }

    /// Overwrites the series value. Intended for restoring persisted state.
    pub fn set(&self, value: impl Into<MetricValue>, tags: Tags) -> Result<()> {
        let value = value.into();
        reject_negative("counter", &self.name, value)?;
        if self.meter.is_muted() {
            return Ok(());
        }
        self.meter.emit(MetricEvent::set(&self.name, tags, value));
        Ok(())
    }
}

/// Bidirectional counter. Amounts are magnitudes; direction comes from the
/// operation, so negative amounts are rejected here too.
pub struct UpDownCounter {
    meter: Arc<Meter>,
    name: String,
}

impl UpDownCounter {
    pub fn increment(&self, value: impl Into<MetricValue>, tags: Tags) -> Result<()> {
        let value = value.into();
        reject_negative("up-down counter", &self.name, value)?;
        if self.meter.is_muted() {
            return Ok(());
        }
        self.meter.emit(MetricEvent::increment(&self.name, tags, value));
        Ok(())
    }

    pub fn decrement(&self, value: impl Into<MetricValue>, tags: Tags) -> Result<()> {
        let value = value.into();
        reject_negative("up-down counter", &self.name, value)?;
        if self.meter.is_muted() {
            return Ok(());
        }
        self.meter.emit(MetricEvent::decrement(&self.name, tags, value));
        Ok(())
    }

    pub fn set(&self, value: impl Into<MetricValue>, tags: Tags) -> Result<()> {
        let value = value.into();
        reject_negative("up-down counter", &self.name, value)?;
        if self.meter.is_muted() {
            return Ok(());
        }
        self.meter.emit(MetricEvent::set(&self.name, tags, value));
        Ok(())
    }
}

/// Last-value instrument. Any value is accepted, including negatives.
#[derive(Clone)]
pub struct Gauge {
    meter: Arc<Meter>,
    name: String,
}

impl Gauge {
    pub fn record(&self, value: impl Into<MetricValue>, tags: Tags) {
        if self.meter.is_muted() {
            return;
        }
        self.meter.emit(MetricEvent::record(&self.name, tags, value.into()));
    }

    /// Spawns a task that calls `observe` after `initial`, then every
    /// `every`, until the handle is aborted or the runtime shuts down.
    pub fn poll(
        &self,
        every: Duration,
        initial: Duration,
        observe: impl Fn(&Gauge) + Send + 'static,
    ) -> JoinHandle<()> {
        let gauge = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(initial).await;
            loop {
                observe(&gauge);
                tokio::time::sleep(every).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricEventKind;
    use tokio::sync::mpsc;

    fn meter() -> (Arc<Meter>, mpsc::UnboundedReceiver<MetricEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Meter::new("app", Level::Info, tx), rx)
    }

    #[test]
    fn test_counter_announces_and_increments() {
        let (meter, mut rx) = meter();
        let counter = meter.counter("requests", Some("1"), Some("handled requests"));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "requests");
        assert!(matches!(
            event.kind,
            MetricEventKind::CreateInstrument {
                instrument: InstrumentKind::Counter,
                ..
            }
        ));

        counter.increment(3, Tags::new()).unwrap();
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.kind,
            MetricEventKind::Increment {
                value: MetricValue::Int(3),
                ..
            }
        ));
    }

    #[test]
    fn test_negative_values_rejected() {
        let (meter, mut rx) = meter();
        let counter = meter.counter("requests", None, None);
        let updown = meter.up_down_counter("in_flight", None, None);
        rx.try_recv().unwrap();
        rx.try_recv().unwrap();

        assert!(counter.increment(-1, Tags::new()).is_err());
        assert!(counter.set(-0.5, Tags::new()).is_err());
        assert!(updown.increment(-2, Tags::new()).is_err());
        assert!(updown.decrement(-2, Tags::new()).is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_negative_value_rejected_even_while_muted() {
        let (meter, mut rx) = meter();
        let counter = meter.counter("requests", None, None);
        rx.try_recv().unwrap();
        meter.mute();

        assert!(counter.increment(-1, Tags::new()).is_err());
        // A valid value while muted is silently accepted and dropped.
        assert!(counter.increment(1, Tags::new()).is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_decrement_emits_decrement() {
        let (meter, mut rx) = meter();
        let updown = meter.up_down_counter("in_flight", None, None);
        rx.try_recv().unwrap();

        updown.decrement(1, Tags::new()).unwrap();
        let event = rx.try_recv().unwrap();
        assert!(matches!(event.kind, MetricEventKind::Decrement { .. }));
    }

    #[test]
    fn test_gauge_accepts_negative_values() {
        let (meter, mut rx) = meter();
        let gauge = meter.gauge("temperature", Some("Cel"), None);
        rx.try_recv().unwrap();

        gauge.record(-12.5, Tags::new());
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.kind,
            MetricEventKind::Record {
                value: MetricValue::Float(v),
                ..
            } if v == -12.5
        ));
    }

    #[test]
    fn test_muted_meter_skips_announcement() {
        let (meter, mut rx) = meter();
        meter.mute();
        let _gauge = meter.gauge("temperature", None, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gauge_poll_observes_on_schedule() {
        let (meter, mut rx) = meter();
        let gauge = meter.gauge("queue_depth", None, None);
        rx.try_recv().unwrap();

        let handle = gauge.poll(
            Duration::from_secs(10),
            Duration::from_secs(1),
            |gauge| gauge.record(42, Tags::new()),
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_ok());
        handle.abort();
    }
}
